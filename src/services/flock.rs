use sqlx::{Postgres, Transaction};

/// Recompute `services.total_members` from the latest remaining
/// State-of-the-Flock submission for the service, ranked by
/// (submission_period desc, created_at desc). NULL when nothing remains.
///
/// Runs inside the transaction that mutated submission_sof, so two
/// concurrent writes for the same service cannot both read a stale
/// "latest" row.
pub async fn recalculate_total_members(
    tx: &mut Transaction<'_, Postgres>,
    service_id: i64,
) -> anyhow::Result<()> {
    let latest: Option<Option<i32>> = sqlx::query_scalar(
        "SELECT total_membership FROM submission_sof
         WHERE service_id = $1
         ORDER BY submission_period DESC NULLS LAST, created_at DESC
         LIMIT 1",
    )
    .bind(service_id)
    .fetch_optional(&mut **tx)
    .await?;

    let total = latest.flatten();

    sqlx::query("UPDATE services SET total_members = $1, updated_at = NOW() WHERE id = $2")
        .bind(total)
        .bind(service_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
