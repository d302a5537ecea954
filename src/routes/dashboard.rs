use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    models::auth::AuthenticatedUser,
    services::{
        analytics::{custom_window, period_window, AnalyticsService},
        dashboard::DashboardService,
    },
    AppState,
};

pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    DashboardService::dashboard(&state.db, &user)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn analytics(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let period = query.period.as_deref().unwrap_or("month").to_lowercase();

    let window = match (&query.start_date, &query.end_date) {
        (Some(start), Some(end)) => custom_window(start, end).ok_or((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid date format. Use YYYY-MM-DD." })),
        ))?,
        _ => period_window(&period, chrono::Utc::now()),
    };

    AnalyticsService::analytics(&state.db, user.user_id, &period, window)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}
