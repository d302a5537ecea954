pub mod auth;
pub mod campaigns;
pub mod dashboard;
pub mod health;
pub mod media;
pub mod services;
pub mod submissions;
pub mod users;

use axum::{http::StatusCode, Json};
use serde_json::{json, Map, Value};

use crate::services::ServiceError;

/// Map service-layer failures onto the wire: validation errors keep their
/// field key, everything unexpected is a 500.
pub(crate) fn error_response(e: ServiceError) -> (StatusCode, Json<Value>) {
    match e {
        ServiceError::Validation { field, message } => {
            let mut body = Map::new();
            body.insert(field.to_string(), Value::String(message));
            (StatusCode::BAD_REQUEST, Json(Value::Object(body)))
        }
        ServiceError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Not found." })),
        ),
        ServiceError::Db(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
        ServiceError::Other(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
