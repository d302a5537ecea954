use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        campaign::SubmissionPayload,
        catalog::coerce_id,
        pagination::PageQuery,
    },
    routes::{campaigns::resolve, error_response},
    services::submissions::{SubmissionFilters, SubmissionService},
    AppState,
};

#[derive(Deserialize)]
pub struct SubmissionListQuery {
    pub campaign: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl SubmissionListQuery {
    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

fn bad_date(field: &'static str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ field: "Invalid date format. Use YYYY-MM-DD." })),
    )
}

fn parse_filters(query: &SubmissionListQuery) -> Result<SubmissionFilters, (StatusCode, Json<Value>)> {
    let campaign = match &query.campaign {
        Some(raw) => Some(
            coerce_id(&Value::String(raw.clone())).ok_or((
                StatusCode::BAD_REQUEST,
                Json(json!({ "campaign": "Invalid campaign id." })),
            ))?,
        ),
        None => None,
    };
    let start_date = match &query.start_date {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| bad_date("start_date"))?,
        ),
        None => None,
    };
    let end_date = match &query.end_date {
        Some(raw) => {
            Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| bad_date("end_date"))?)
        }
        None => None,
    };
    Ok(SubmissionFilters {
        campaign,
        start_date,
        end_date,
    })
}

pub async fn list_submissions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<String>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    let filters = parse_filters(&query)?;
    SubmissionService::list(&state.db, entry, &user, &filters, &query.page())
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
pub struct CreateQuery {
    pub campaign: Option<String>,
}

pub async fn create_submission(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(kind): Path<String>,
    Query(query): Query<CreateQuery>,
    Json(body): Json<SubmissionPayload>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    SubmissionService::create(&state.db, entry, &user, &body, query.campaign.as_deref())
        .await
        .map(|submission| (StatusCode::CREATED, Json(submission)))
        .map_err(error_response)
}

pub async fn get_submission(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    SubmissionService::get(&state.db, entry, &user, id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn update_submission(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
    Json(body): Json<SubmissionPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    SubmissionService::update(&state.db, entry, &user, id, &body)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_submission(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;
    SubmissionService::delete(&state.db, entry, &user, id, &state.config.media_dir)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// Multipart picture upload for submission types that accept attachments.
pub async fn upload_submission_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((kind, id)): Path<(String, i64)>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let entry = resolve(&kind)?;

    let mut uploads: Vec<(String, Vec<u8>)> = Vec::new();
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
        uploads.push((name, data.to_vec()));
    }

    if uploads.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "picture_files": "No files provided." })),
        ));
    }

    SubmissionService::add_files(&state.db, entry, &user, id, uploads, &state.config.media_dir)
        .await
        .map(|files| (StatusCode::CREATED, Json(json!({ "pictures": files }))))
        .map_err(error_response)
}
