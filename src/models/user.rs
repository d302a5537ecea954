use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::models::service::Service;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "PASTOR")]
    Pastor,
    #[serde(rename = "HELPER")]
    Helper,
    #[serde(rename = "CAMPAIGN_MANAGER")]
    CampaignManager,
}

impl UserRole {
    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn is_campaign_manager(self) -> bool {
        matches!(self, UserRole::CampaignManager)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserRole::Admin => "ADMIN",
            UserRole::Pastor => "PASTOR",
            UserRole::Helper => "HELPER",
            UserRole::CampaignManager => "CAMPAIGN_MANAGER",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "PASTOR" => Ok(UserRole::Pastor),
            "HELPER" => Ok(UserRole::Helper),
            "CAMPAIGN_MANAGER" => Ok(UserRole::CampaignManager),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// DB row struct — role is kept as TEXT and parsed where a typed value is needed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub service_id: Option<i64>,
    pub phone_number: Option<String>,
    pub profile_picture: Option<String>,
    pub password_changed: bool,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: uuid::Uuid,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// Public shape of a user, with the service embedded.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub service: Option<Service>,
    pub profile_picture: Option<String>,
    pub password_changed: bool,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_user(u: User, service: Option<Service>) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            phone_number: u.phone_number,
            role: u.role.parse().unwrap_or(UserRole::Pastor),
            service,
            profile_picture: u.profile_picture,
            password_changed: u.password_changed,
            created_at: u.created_at,
        }
    }
}

// Request/Response DTOs

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    /// Numeric id; accepted as JSON number or numeric string.
    pub service: Value,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub service: Option<Value>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentInput {
    pub campaign_type: String,
    /// Numeric id; accepted as JSON number or numeric string.
    pub campaign_id: Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignManagerRequest {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub assignments: Vec<AssignmentInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignManagerRequest {
    pub assignments: Vec<AssignmentInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_text_storage() {
        for role in [
            UserRole::Admin,
            UserRole::Pastor,
            UserRole::Helper,
            UserRole::CampaignManager,
        ] {
            let stored = role.to_string();
            assert_eq!(stored.parse::<UserRole>().unwrap(), role);
        }
        assert!("PARENT".parse::<UserRole>().is_err());
    }

    #[test]
    fn full_name_handles_missing_parts() {
        let mut user = User {
            id: 1,
            username: "kboateng".into(),
            email: "k@example.org".into(),
            password_hash: "x".into(),
            first_name: Some("Kofi".into()),
            last_name: None,
            role: "PASTOR".into(),
            service_id: None,
            phone_number: None,
            profile_picture: None,
            password_changed: false,
            is_active: true,
            last_login: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(user.full_name(), "Kofi");
        user.last_name = Some("Boateng".into());
        assert_eq!(user.full_name(), "Kofi Boateng");
    }
}
