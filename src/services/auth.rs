use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    auth::{Claims, RefreshClaims},
    user::{LoginResponse, RefreshToken, User, UserRole},
};
use crate::services::users::UserService;

pub struct AuthService;

impl AuthService {
    /// Validate credentials and issue an access/refresh token pair.
    pub async fn login(
        pool: &PgPool,
        username: &str,
        password: &str,
        jwt_secret: &str,
        refresh_secret: &str,
        access_ttl: u64,
        refresh_ttl_days: u64,
    ) -> anyhow::Result<LoginResponse> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 AND is_active = TRUE",
        )
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Invalid credentials"))?;

        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|_| anyhow::anyhow!("Invalid credentials"))?;
        if !valid {
            anyhow::bail!("Invalid credentials");
        }

        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(pool)
            .await?;

        let access = Self::generate_access_token(&user, jwt_secret, access_ttl)?;
        let (refresh, jti) = Self::generate_refresh_token(user.id, refresh_secret, refresh_ttl_days)?;
        Self::store_refresh_token(pool, user.id, &refresh, jti, refresh_ttl_days).await?;

        let profile = UserService::profile_for(pool, user).await?;
        Ok(LoginResponse { access, refresh, user: profile })
    }

    pub fn generate_access_token(
        user: &User,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let role: UserRole = user.role.parse().unwrap_or(UserRole::Pastor);
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(
        user_id: i64,
        secret: &str,
        ttl_days: u64,
    ) -> anyhow::Result<(String, Uuid)> {
        let now = Utc::now().timestamp() as usize;
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + (ttl_days * 86400) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }

    async fn store_refresh_token(
        pool: &PgPool,
        user_id: i64,
        token: &str,
        jti: Uuid,
        ttl_days: u64,
    ) -> anyhow::Result<()> {
        let hash = bcrypt::hash(token, 8)?;
        let expires_at = Utc::now() + chrono::Duration::days(ttl_days as i64);
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(jti)
        .bind(user_id)
        .bind(hash)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Rotate refresh token: revoke old, issue new pair.
    pub async fn refresh(
        pool: &PgPool,
        refresh_token_str: &str,
        jwt_secret: &str,
        refresh_secret: &str,
        access_ttl: u64,
        refresh_ttl_days: u64,
    ) -> anyhow::Result<LoginResponse> {
        let key = DecodingKey::from_secret(refresh_secret.as_bytes());
        let data = decode::<RefreshClaims>(
            refresh_token_str,
            &key,
            &Validation::new(Algorithm::HS256),
        )?;
        let rc = data.claims;
        let jti: Uuid = rc.jti.parse()?;
        let user_id: i64 = rc.sub.parse()?;

        let stored: RefreshToken = sqlx::query_as(
            "SELECT * FROM refresh_tokens WHERE id = $1 AND revoked = FALSE",
        )
        .bind(jti)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Refresh token not found or revoked"))?;

        if stored.expires_at < Utc::now() {
            anyhow::bail!("Refresh token expired");
        }
        if !bcrypt::verify(refresh_token_str, &stored.token_hash)? {
            anyhow::bail!("Refresh token invalid");
        }

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1")
            .bind(jti)
            .execute(pool)
            .await?;

        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let access = Self::generate_access_token(&user, jwt_secret, access_ttl)?;
        let (refresh, new_jti) =
            Self::generate_refresh_token(user.id, refresh_secret, refresh_ttl_days)?;
        Self::store_refresh_token(pool, user.id, &refresh, new_jti, refresh_ttl_days).await?;

        let profile = UserService::profile_for(pool, user).await?;
        Ok(LoginResponse { access, refresh, user: profile })
    }

    /// Check that a token is a structurally valid, unexpired access or
    /// refresh token (either secret is accepted, mirroring the verify
    /// endpoint of the original token stack).
    pub fn verify(token: &str, jwt_secret: &str, refresh_secret: &str) -> bool {
        let validation = Validation::new(Algorithm::HS256);
        let access_key = DecodingKey::from_secret(jwt_secret.as_bytes());
        if decode::<Claims>(token, &access_key, &validation).is_ok() {
            return true;
        }
        let refresh_key = DecodingKey::from_secret(refresh_secret.as_bytes());
        decode::<RefreshClaims>(token, &refresh_key, &validation).is_ok()
    }
}
