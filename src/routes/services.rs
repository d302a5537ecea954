use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        pagination::PageQuery,
        service::{CreateServiceRequest, Service, UpdateServiceRequest},
    },
    routes::users::require_admin,
    AppState,
};

fn db_error(e: sqlx::Error) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

pub async fn list_services(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM services")
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    let services = sqlx::query_as::<_, Service>(
        "SELECT * FROM services ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(page.envelope(count, serde_json::to_value(services).unwrap())))
}

pub async fn create_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    let service = sqlx::query_as::<_, Service>(
        "INSERT INTO services (name, location, total_members)
         VALUES ($1, $2, $3)
         RETURNING *",
    )
    .bind(&body.name)
    .bind(&body.location)
    .bind(body.total_members)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "name": "A service with this name or location already exists." })),
        ),
        e => db_error(e),
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::to_value(service).unwrap())))
}

pub async fn get_service(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let service = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(db_error)?
        .ok_or((StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))))?;

    Ok(Json(serde_json::to_value(service).unwrap()))
}

pub async fn update_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    let service = sqlx::query_as::<_, Service>(
        "UPDATE services
         SET name = COALESCE($1, name),
             location = COALESCE($2, location),
             total_members = COALESCE($3, total_members),
             updated_at = NOW()
         WHERE id = $4
         RETURNING *",
    )
    .bind(&body.name)
    .bind(&body.location)
    .bind(body.total_members)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or((StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))))?;

    Ok(Json(serde_json::to_value(service).unwrap()))
}

pub async fn delete_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM services WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))));
    }
    Ok(StatusCode::NO_CONTENT)
}
