use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        campaign::{CreateCampaignRequest, UpdateCampaignRequest},
        catalog::{entry_for_slug, CatalogEntry},
        pagination::PageQuery,
    },
    routes::{error_response, users::require_admin},
    services::{campaigns::CampaignService, files::FileStore},
    AppState,
};

pub(crate) fn resolve(slug: &str) -> Result<&'static CatalogEntry, (StatusCode, Json<Value>)> {
    entry_for_slug(slug).ok_or((
        StatusCode::NOT_FOUND,
        Json(json!({ "detail": "Unknown campaign type." })),
    ))
}

#[derive(Deserialize)]
pub struct AllCampaignsQuery {
    pub status: Option<String>,
}

/// Cross-type campaign listing. Managers only get their assigned campaigns.
pub async fn all_campaigns(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AllCampaignsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    CampaignService::list_all(&state.db, &user, query.status.as_deref())
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(kind): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    CampaignService::list_kind(&state.db, entry, &page)
        .await
        .map(|(count, results)| Json(page.envelope(count, json!(results))))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

pub async fn create_campaign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<String>,
    Json(body): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    require_admin(&user)?;
    CampaignService::create(&state.db, entry, &body)
        .await
        .map(|campaign| (StatusCode::CREATED, Json(campaign)))
        .map_err(error_response)
}

pub async fn get_campaign(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    CampaignService::get(&state.db, entry, id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn update_campaign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
    Json(body): Json<UpdateCampaignRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    require_admin(&user)?;
    CampaignService::update(&state.db, entry, id, &body)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    require_admin(&user)?;
    CampaignService::delete(&state.db, entry, id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// Multipart icon upload; the first file part wins.
pub async fn upload_icon(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    require_admin(&user)?;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
    })? {
        let Some(name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

        let stored = FileStore::save(&state.config.media_dir, "icons", &name, &data)
            .await
            .map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string() })),
                )
            })?;

        CampaignService::set_icon(&state.db, entry, id, &stored)
            .await
            .map_err(error_response)?;

        return Ok(Json(json!({ "icon": stored })));
    }

    Err((
        StatusCode::BAD_REQUEST,
        Json(json!({ "icon": "No file provided." })),
    ))
}
