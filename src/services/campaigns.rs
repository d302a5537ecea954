use serde_json::{json, Value};
use sqlx::PgPool;

use crate::models::{
    auth::AuthenticatedUser,
    campaign::{
        is_valid_status, Campaign, CreateCampaignRequest, UpdateCampaignRequest, STATUS_ACTIVE,
    },
    catalog::{CampaignKind, CatalogEntry, CATALOG},
    pagination::PageQuery,
};
use crate::services::{assignments::AssignmentService, ServiceError};

fn campaign_json(c: &Campaign, kind: CampaignKind) -> Value {
    json!({
        "id": c.id,
        "name": c.name,
        "description": c.description,
        "icon": c.icon,
        "campaign_code": c.campaign_code,
        "status": c.status,
        "campaign_type": kind.display_name(),
        "campaign_type_slug": kind.slug(),
        "created_at": c.created_at,
        "updated_at": c.updated_at,
    })
}

pub struct CampaignService;

impl CampaignService {
    /// Cross-kind listing. Campaign managers only see campaigns they are
    /// assigned to; kinds with no assignments are skipped outright.
    pub async fn list_all(
        pool: &PgPool,
        user: &AuthenticatedUser,
        status: Option<&str>,
    ) -> anyhow::Result<Value> {
        let mut campaigns: Vec<(chrono::DateTime<chrono::Utc>, Value)> = Vec::new();

        for entry in CATALOG {
            let assigned = if user.role.is_campaign_manager() {
                let ids = AssignmentService::assigned_ids(pool, user.user_id, entry.kind).await?;
                if ids.is_empty() {
                    continue;
                }
                Some(ids)
            } else {
                None
            };

            let mut sql = format!("SELECT * FROM {} WHERE 1=1", entry.campaign_table);
            if assigned.is_some() {
                sql.push_str(" AND id = ANY($1)");
                if status.is_some() {
                    sql.push_str(" AND status = $2");
                }
            } else if status.is_some() {
                sql.push_str(" AND status = $1");
            }
            sql.push_str(" ORDER BY created_at DESC");

            let mut query = sqlx::query_as::<_, Campaign>(&sql);
            if let Some(ids) = &assigned {
                query = query.bind(ids);
            }
            if let Some(s) = status {
                query = query.bind(s);
            }

            let rows = query.fetch_all(pool).await?;
            for c in rows {
                campaigns.push((c.created_at, campaign_json(&c, entry.kind)));
            }
        }

        campaigns.sort_by(|a, b| b.0.cmp(&a.0));
        let results: Vec<Value> = campaigns.into_iter().map(|(_, v)| v).collect();

        Ok(json!({ "count": results.len(), "results": results }))
    }

    pub async fn list_kind(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        page: &PageQuery,
    ) -> anyhow::Result<(i64, Vec<Value>)> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", entry.campaign_table))
                .fetch_one(pool)
                .await?;
        let rows = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT * FROM {} ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            entry.campaign_table
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
        Ok((
            count,
            rows.iter().map(|c| campaign_json(c, entry.kind)).collect(),
        ))
    }

    pub async fn get(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        id: i64,
    ) -> Result<Value, ServiceError> {
        let row = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT * FROM {} WHERE id = $1",
            entry.campaign_table
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        Ok(campaign_json(&row, entry.kind))
    }

    pub async fn create(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        req: &CreateCampaignRequest,
    ) -> Result<Value, ServiceError> {
        let status = req.status.as_deref().unwrap_or(STATUS_ACTIVE);
        if !is_valid_status(status) {
            return Err(ServiceError::validation("status", "Invalid status."));
        }

        let row = sqlx::query_as::<_, Campaign>(&format!(
            "INSERT INTO {} (name, description, campaign_code, status)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
            entry.campaign_table
        ))
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.campaign_code)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ServiceError::validation("name", "A campaign with this name already exists.")
            }
            e => ServiceError::Db(e),
        })?;

        Ok(campaign_json(&row, entry.kind))
    }

    pub async fn update(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        id: i64,
        req: &UpdateCampaignRequest,
    ) -> Result<Value, ServiceError> {
        if let Some(s) = &req.status {
            if !is_valid_status(s) {
                return Err(ServiceError::validation("status", "Invalid status."));
            }
        }

        let row = sqlx::query_as::<_, Campaign>(&format!(
            "UPDATE {}
             SET name = COALESCE($1, name),
                 description = COALESCE($2, description),
                 campaign_code = COALESCE($3, campaign_code),
                 status = COALESCE($4, status),
                 updated_at = NOW()
             WHERE id = $5
             RETURNING *",
            entry.campaign_table
        ))
        .bind(&req.name)
        .bind(&req.description)
        .bind(&req.campaign_code)
        .bind(&req.status)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ServiceError::NotFound)?;

        Ok(campaign_json(&row, entry.kind))
    }

    pub async fn delete(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        id: i64,
    ) -> Result<(), ServiceError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", entry.campaign_table))
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn set_icon(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        id: i64,
        icon_path: &str,
    ) -> Result<(), ServiceError> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET icon = $1, updated_at = NOW() WHERE id = $2",
            entry.campaign_table
        ))
        .bind(icon_path)
        .bind(id)
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn exists(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        id: i64,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            entry.campaign_table
        ))
        .bind(id)
        .fetch_one(pool)
        .await
    }
}
