use sqlx::PgPool;

use crate::models::catalog::CampaignKind;

/// One assignment row, with the kind tag resolved back to a slug.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssignmentRow {
    pub campaign_kind: String,
    pub campaign_id: i64,
}

pub struct AssignmentService;

impl AssignmentService {
    /// Campaign ids of the given kind this manager is assigned to. An empty
    /// result means the manager sees nothing for that kind (fail-closed).
    pub async fn assigned_ids(
        pool: &PgPool,
        user_id: i64,
        kind: CampaignKind,
    ) -> anyhow::Result<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT campaign_id FROM campaign_manager_assignments
             WHERE user_id = $1 AND campaign_kind = $2",
        )
        .bind(user_id)
        .bind(kind.slug())
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    pub async fn is_assigned(
        pool: &PgPool,
        user_id: i64,
        kind: CampaignKind,
        campaign_id: i64,
    ) -> anyhow::Result<bool> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM campaign_manager_assignments
                 WHERE user_id = $1 AND campaign_kind = $2 AND campaign_id = $3
             )",
        )
        .bind(user_id)
        .bind(kind.slug())
        .bind(campaign_id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// All assignments for a manager, across kinds.
    pub async fn list_for_user(pool: &PgPool, user_id: i64) -> anyhow::Result<Vec<AssignmentRow>> {
        let rows = sqlx::query_as(
            "SELECT campaign_kind, campaign_id FROM campaign_manager_assignments
             WHERE user_id = $1
             ORDER BY campaign_kind, campaign_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
