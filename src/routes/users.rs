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
        service::Service,
        user::{
            ChangePasswordRequest, CreateCampaignManagerRequest, CreateUserRequest,
            UpdateCampaignManagerRequest, UpdateUserRequest, User,
        },
    },
    routes::error_response,
    services::users::UserService,
    AppState,
};

pub(crate) fn require_admin(user: &AuthenticatedUser) -> Result<(), (StatusCode, Json<Value>)> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err((StatusCode::FORBIDDEN, Json(json!({ "detail": "Admin access required." }))))
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    UserService::list(&state.db, &page)
        .await
        .map(|(count, users)| Json(page.envelope(count, serde_json::to_value(users).unwrap())))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_admin(&user)?;
    UserService::create(&state.db, &body)
        .await
        .map(|(profile, password)| {
            let mut value = serde_json::to_value(profile).unwrap();
            // Returned exactly once; the admin hands it to the new user,
            // who must change it on first login.
            value["generated_password"] = json!(password);
            (StatusCode::CREATED, Json(value))
        })
        .map_err(error_response)
}

pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    UserService::get(&state.db, id)
        .await
        .map(|profile| Json(serde_json::to_value(profile).unwrap()))
        .map_err(error_response)
}

pub async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&user)?;
    UserService::update(&state.db, id, &body)
        .await
        .map(|profile| Json(serde_json::to_value(profile).unwrap()))
        .map_err(error_response)
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    require_admin(&user)?;
    UserService::delete(&state.db, id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    UserService::get(&state.db, user.user_id)
        .await
        .map(|profile| Json(serde_json::to_value(profile).unwrap()))
        .map_err(error_response)
}

/// The authenticated user's own service details.
pub async fn get_service(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    let service_id = row.and_then(|u| u.service_id).ok_or((
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "User has no service assigned" })),
    ))?;

    let service = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
        .bind(service_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "User has no service assigned" })),
        ))?;

    Ok(Json(serde_json::to_value(service).unwrap()))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    UserService::change_password(&state.db, user.user_id, &body)
        .await
        .map(|_| {
            Json(json!({
                "message": "Password changed successfully",
                "password_changed": true,
            }))
        })
        .map_err(error_response)
}

pub async fn create_campaign_manager(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCampaignManagerRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    require_admin(&user)?;
    UserService::create_campaign_manager(&state.db, &body)
        .await
        .map(|(profile, password)| {
            let mut value = serde_json::to_value(profile).unwrap();
            value["generated_password"] = json!(password);
            (StatusCode::CREATED, Json(value))
        })
        .map_err(error_response)
}

pub async fn update_campaign_manager(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCampaignManagerRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&user)?;
    UserService::replace_assignments(&state.db, id, &body.assignments)
        .await
        .map(|_| Json(json!({ "message": "Assignments updated" })))
        .map_err(error_response)
}
