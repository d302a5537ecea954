pub mod analytics;
pub mod assignments;
pub mod auth;
pub mod campaigns;
pub mod dashboard;
pub mod files;
pub mod flock;
pub mod submissions;
pub mod users;

/// Error shape shared by the write paths: a field-keyed validation failure
/// (client error, serialized as `{"<field>": "<message>"}`), a missing
/// resource, or an underlying failure.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("Not found.")]
    NotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field,
            message: message.into(),
        }
    }
}
