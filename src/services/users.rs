use rand::Rng;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::{
    catalog::{coerce_id, entry_for_slug},
    pagination::PageQuery,
    service::Service,
    user::{
        AssignmentInput, ChangePasswordRequest, CreateCampaignManagerRequest, CreateUserRequest,
        UpdateUserRequest, User, UserProfile, UserRole,
    },
};
use crate::services::ServiceError;

const GENERATED_PASSWORD_LEN: usize = 12;

pub struct UserService;

impl UserService {
    /// Random initial password for accounts created by an admin. The account
    /// keeps `password_changed = FALSE` until the owner rotates it.
    pub fn generate_password() -> String {
        rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(GENERATED_PASSWORD_LEN)
            .map(char::from)
            .collect()
    }

    pub async fn profile_for(pool: &PgPool, user: User) -> anyhow::Result<UserProfile> {
        let service = match user.service_id {
            Some(id) => {
                sqlx::query_as::<_, Service>("SELECT * FROM services WHERE id = $1")
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
            None => None,
        };
        Ok(UserProfile::from_user(user, service))
    }

    pub async fn get(pool: &PgPool, id: i64) -> Result<UserProfile, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ServiceError::NotFound)?;
        Ok(Self::profile_for(pool, user).await?)
    }

    pub async fn list(
        pool: &PgPool,
        page: &PageQuery,
    ) -> anyhow::Result<(i64, Vec<UserProfile>)> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        let mut profiles = Vec::with_capacity(users.len());
        for user in users {
            profiles.push(Self::profile_for(pool, user).await?);
        }
        Ok((count, profiles))
    }

    async fn service_exists(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM services WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Create a user with a generated password. Returns the profile and the
    /// one-time cleartext password for the admin to hand over.
    pub async fn create(
        pool: &PgPool,
        req: &CreateUserRequest,
    ) -> Result<(UserProfile, String), ServiceError> {
        let service_id = coerce_id(&req.service)
            .ok_or_else(|| ServiceError::validation("service", "Service does not exist."))?;
        if !Self::service_exists(pool, service_id).await? {
            return Err(ServiceError::validation("service", "Service does not exist."));
        }

        let role = req.role.unwrap_or(UserRole::Pastor);
        if role.is_campaign_manager() {
            return Err(ServiceError::validation(
                "role",
                "Use the create-campaign-manager endpoint for this role.",
            ));
        }

        let password = Self::generate_password();
        let password_hash = bcrypt::hash(&password, 12).map_err(anyhow::Error::from)?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, first_name, last_name,
                                role, service_id, phone_number)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(&req.username)
        .bind(&req.email)
        .bind(&password_hash)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(role.to_string())
        .bind(service_id)
        .bind(&req.phone_number)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ServiceError::validation("username", "A user with these details already exists.")
            }
            e => ServiceError::Db(e),
        })?;

        let profile = Self::profile_for(pool, user).await?;
        Ok((profile, password))
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        req: &UpdateUserRequest,
    ) -> Result<UserProfile, ServiceError> {
        let service_id = match &req.service {
            Some(v) => {
                let sid = coerce_id(v)
                    .ok_or_else(|| ServiceError::validation("service", "Service does not exist."))?;
                if !Self::service_exists(pool, sid).await? {
                    return Err(ServiceError::validation("service", "Service does not exist."));
                }
                Some(sid)
            }
            None => None,
        };

        let user = sqlx::query_as::<_, User>(
            "UPDATE users
             SET username = COALESCE($1, username),
                 email = COALESCE($2, email),
                 first_name = COALESCE($3, first_name),
                 last_name = COALESCE($4, last_name),
                 phone_number = COALESCE($5, phone_number),
                 role = COALESCE($6, role),
                 service_id = COALESCE($7, service_id),
                 updated_at = NOW()
             WHERE id = $8
             RETURNING *",
        )
        .bind(&req.username)
        .bind(&req.email)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.phone_number)
        .bind(req.role.map(|r| r.to_string()))
        .bind(service_id)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ServiceError::NotFound)?;

        Ok(Self::profile_for(pool, user).await?)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<(), ServiceError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn change_password(
        pool: &PgPool,
        user_id: i64,
        req: &ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        if req.new_password != req.confirm_password {
            return Err(ServiceError::validation(
                "confirm_password",
                "New password and confirm password do not match.",
            ));
        }
        if req.old_password == req.new_password {
            return Err(ServiceError::validation(
                "new_password",
                "New password must be different from old password.",
            ));
        }
        if req.new_password.len() < 6 {
            return Err(ServiceError::validation(
                "new_password",
                "Password must be at least 6 characters.",
            ));
        }

        let password_hash: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1 AND is_active = TRUE")
                .bind(user_id)
                .fetch_optional(pool)
                .await?
                .ok_or(ServiceError::NotFound)?;

        let valid = bcrypt::verify(&req.old_password, &password_hash).unwrap_or(false);
        if !valid {
            return Err(ServiceError::validation(
                "old_password",
                "Old password is incorrect.",
            ));
        }

        let new_hash = bcrypt::hash(&req.new_password, 12).map_err(anyhow::Error::from)?;
        sqlx::query(
            "UPDATE users SET password_hash = $1, password_changed = TRUE, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(&new_hash)
        .bind(user_id)
        .execute(pool)
        .await?;

        // Revoke refresh tokens to force re-login with the new password.
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Resolve and validate assignment inputs against the catalog and the
    /// campaign tables. Ids are normalized to i64 before anything is stored.
    async fn resolve_assignments(
        pool: &PgPool,
        inputs: &[AssignmentInput],
    ) -> Result<Vec<(&'static str, i64)>, ServiceError> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            let entry = entry_for_slug(&input.campaign_type)
                .ok_or_else(|| ServiceError::validation("campaign_type", "Unknown campaign type."))?;
            let campaign_id = coerce_id(&input.campaign_id)
                .ok_or_else(|| ServiceError::validation("campaign_id", "Invalid campaign id."))?;

            let exists: bool = sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
                entry.campaign_table
            ))
            .bind(campaign_id)
            .fetch_one(pool)
            .await?;
            if !exists {
                return Err(ServiceError::validation("campaign_id", "Invalid campaign id."));
            }

            resolved.push((entry.slug, campaign_id));
        }
        Ok(resolved)
    }

    async fn insert_assignments(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        assignments: &[(&'static str, i64)],
    ) -> Result<(), sqlx::Error> {
        for (slug, campaign_id) in assignments {
            sqlx::query(
                "INSERT INTO campaign_manager_assignments (user_id, campaign_kind, campaign_id)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (user_id, campaign_kind, campaign_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(slug)
            .bind(campaign_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Create a Campaign Manager: no service, assignments define the entire
    /// authorization surface.
    pub async fn create_campaign_manager(
        pool: &PgPool,
        req: &CreateCampaignManagerRequest,
    ) -> Result<(UserProfile, String), ServiceError> {
        let assignments = Self::resolve_assignments(pool, &req.assignments).await?;

        let password = Self::generate_password();
        let password_hash = bcrypt::hash(&password, 12).map_err(anyhow::Error::from)?;

        let mut tx = pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, first_name, last_name,
                                role, phone_number)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(&req.username)
        .bind(&req.email)
        .bind(&password_hash)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(UserRole::CampaignManager.to_string())
        .bind(&req.phone_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ServiceError::validation("username", "A user with these details already exists.")
            }
            e => ServiceError::Db(e),
        })?;

        Self::insert_assignments(&mut tx, user.id, &assignments).await?;
        tx.commit().await?;

        let profile = Self::profile_for(pool, user).await?;
        Ok((profile, password))
    }

    /// Replace a manager's assignment set.
    pub async fn replace_assignments(
        pool: &PgPool,
        user_id: i64,
        inputs: &[AssignmentInput],
    ) -> Result<(), ServiceError> {
        let role: String = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(ServiceError::NotFound)?;
        if role.parse::<UserRole>().ok() != Some(UserRole::CampaignManager) {
            return Err(ServiceError::validation(
                "user",
                "User is not a campaign manager.",
            ));
        }

        let assignments = Self::resolve_assignments(pool, inputs).await?;

        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM campaign_manager_assignments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_assignments(&mut tx, user_id, &assignments).await?;
        tx.commit().await?;

        Ok(())
    }
}
