use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Shared row shape of all 21 campaign tables.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub campaign_code: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_INACTIVE: &str = "INACTIVE";

pub fn is_valid_status(s: &str) -> bool {
    s == STATUS_ACTIVE || s == STATUS_INACTIVE
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub description: Option<String>,
    pub campaign_code: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub campaign_code: Option<String>,
    pub status: Option<String>,
}

/// Shared row shape of the submission pictures tables.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubmissionFile {
    pub id: i64,
    pub submission_id: i64,
    pub file: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Body of a submission create/update. Category-specific metric fields
/// arrive flattened alongside the base fields and are validated against
/// the catalog entry for the target kind.
#[derive(Debug, Deserialize)]
pub struct SubmissionPayload {
    /// Campaign id as JSON number or numeric string.
    pub campaign: Option<Value>,
    /// Required for campaign managers, ignored for everyone else.
    pub service: Option<Value>,
    pub submission_period: Option<chrono::NaiveDate>,
    pub date: Option<chrono::NaiveDate>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}
