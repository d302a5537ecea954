use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};

use crate::models::{
    auth::AuthenticatedUser,
    campaign::Campaign,
    catalog::{entry_for_slug, CampaignKind, CatalogEntry, CATALOG},
    user::User,
};
use crate::services::{assignments::AssignmentService, submissions::field_to_json, users::UserService};

const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct RecentSubmission {
    pub id: i64,
    pub campaign_id: i64,
    pub campaign_name: Option<String>,
    pub kind: CampaignKind,
    pub submission_period: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub submission_count: i64,
    pub preview: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct RecentCampaign {
    pub campaign_id: i64,
    pub name: Option<String>,
    pub kind: CampaignKind,
    pub status: String,
    pub icon: Option<String>,
    pub last_accessed: DateTime<Utc>,
    pub submission_count: i64,
}

/// Merge the per-kind scans: newest first, one entry per (campaign, kind),
/// at most five.
fn fold_recent_submissions(mut subs: Vec<RecentSubmission>) -> Vec<RecentSubmission> {
    subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for s in subs {
        if seen.insert((s.campaign_id, s.kind)) {
            out.push(s);
            if out.len() >= RECENT_LIMIT {
                break;
            }
        }
    }
    out
}

fn fold_recent_campaigns(mut camps: Vec<RecentCampaign>) -> Vec<RecentCampaign> {
    camps.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
    camps.truncate(RECENT_LIMIT);
    camps
}

/// Per-kind scope for the dashboard scans. None = kind skipped entirely
/// (manager with no assignments of this kind).
fn kind_scope<'a>(
    assignments: &'a Option<HashMap<CampaignKind, Vec<i64>>>,
    kind: CampaignKind,
) -> Option<Option<&'a [i64]>> {
    match assignments {
        None => Some(None),
        Some(map) => map.get(&kind).map(|ids| Some(ids.as_slice())),
    }
}

pub struct DashboardService;

impl DashboardService {
    pub async fn dashboard(pool: &PgPool, auth: &AuthenticatedUser) -> anyhow::Result<Value> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(auth.user_id)
            .fetch_one(pool)
            .await?;

        // Managers only see their assigned campaign ids, grouped per kind.
        let assignments: Option<HashMap<CampaignKind, Vec<i64>>> =
            if auth.role.is_campaign_manager() {
                let rows = AssignmentService::list_for_user(pool, auth.user_id).await?;
                let mut map: HashMap<CampaignKind, Vec<i64>> = HashMap::new();
                for row in rows {
                    if let Some(entry) = entry_for_slug(&row.campaign_kind) {
                        map.entry(entry.kind).or_default().push(row.campaign_id);
                    }
                }
                Some(map)
            } else {
                None
            };

        let mut all_submissions: Vec<RecentSubmission> = Vec::new();
        let mut campaign_activity: Vec<RecentCampaign> = Vec::new();
        let mut submissions_this_month: i64 = 0;

        for entry in CATALOG {
            let Some(scope) = kind_scope(&assignments, entry.kind) else {
                continue;
            };

            // A failing kind is dropped from the aggregate rather than
            // failing the whole dashboard.
            match Self::scan_kind(pool, entry, auth.user_id, scope).await {
                Ok((recents, activity, month_count)) => {
                    all_submissions.extend(recents);
                    campaign_activity.extend(activity);
                    submissions_this_month += month_count;
                }
                Err(e) => {
                    tracing::warn!("dashboard scan failed for {}: {}", entry.slug, e);
                    continue;
                }
            }
        }

        let active_campaigns = campaign_activity.len();
        let recent_submissions = fold_recent_submissions(all_submissions);
        let recent_campaigns = fold_recent_campaigns(campaign_activity);

        let service_data = match user.service_id {
            Some(_) => {
                let profile = UserService::profile_for(pool, user).await?;
                profile.service.map(|s| {
                    json!({
                        "id": s.id,
                        "name": s.name.unwrap_or_else(|| "No Service Name".into()),
                        "location": s.location.unwrap_or_else(|| "Location not specified".into()),
                        "total_members": s.total_members.unwrap_or(0),
                    })
                })
            }
            None => None,
        };

        let mut body = json!({
            "service": service_data,
            "statistics": {
                "active_campaigns": active_campaigns,
                "submissions_this_month": submissions_this_month,
            },
            "recent_submissions": recent_submissions.iter().map(|s| json!({
                "id": s.id,
                "campaign_id": s.campaign_id,
                "campaign_name": s.campaign_name,
                "campaign_type": s.kind.display_name(),
                "submission_period": s.submission_period,
                "created_at": s.created_at,
                "submission_count": s.submission_count,
                "preview_data": s.preview,
            })).collect::<Vec<_>>(),
            "active_campaigns": recent_campaigns.iter().map(|c| json!({
                "id": c.campaign_id,
                "name": c.name,
                "campaign_type": c.kind.display_name(),
                "status": c.status,
                "icon": c.icon,
                "last_accessed": c.last_accessed,
                "submission_count": c.submission_count,
            })).collect::<Vec<_>>(),
        });

        if let Some(map) = &assignments {
            let assigned = Self::assigned_campaigns(pool, map).await?;
            body.as_object_mut()
                .expect("body is an object")
                .insert("assigned_campaigns".into(), json!(assigned));
        }

        Ok(body)
    }

    /// One kind's contribution: the five newest submissions, the per-campaign
    /// activity (most recent submission per campaign), and the count of
    /// submissions created this calendar month.
    async fn scan_kind(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user_id: i64,
        scope: Option<&[i64]>,
    ) -> anyhow::Result<(Vec<RecentSubmission>, Vec<RecentCampaign>, i64)> {
        let scope_cond = if scope.is_some() {
            " AND s.campaign_id = ANY($2)"
        } else {
            ""
        };

        let counts = Self::counts_by_campaign(pool, entry, user_id).await?;

        let mut preview_cols = String::new();
        for field in entry.preview_fields {
            preview_cols.push_str(", s.");
            preview_cols.push_str(field);
        }

        let recent_sql = format!(
            "SELECT s.id, s.campaign_id, c.name AS campaign_name, s.submission_period,
                    s.created_at{preview_cols}
             FROM {sub} s JOIN {camp} c ON c.id = s.campaign_id
             WHERE s.submitted_by = $1{scope_cond}
             ORDER BY s.created_at DESC
             LIMIT 5",
            sub = entry.submission_table,
            camp = entry.campaign_table,
        );
        let mut q = sqlx::query(&recent_sql).bind(user_id);
        if let Some(ids) = scope {
            q = q.bind(ids.to_vec());
        }
        let rows = q.fetch_all(pool).await?;

        let recents = rows
            .iter()
            .map(|row| {
                let campaign_id: i64 = row.get("campaign_id");
                let mut preview = Map::new();
                for field in entry.preview_fields {
                    let spec = entry
                        .fields
                        .iter()
                        .find(|f| f.name == *field)
                        .expect("preview fields are declared fields");
                    preview.insert(field.to_string(), field_to_json(row, spec));
                }
                RecentSubmission {
                    id: row.get("id"),
                    campaign_id,
                    campaign_name: row.get("campaign_name"),
                    kind: entry.kind,
                    submission_period: row.get("submission_period"),
                    created_at: row.get("created_at"),
                    submission_count: counts.get(&campaign_id).copied().unwrap_or(0),
                    preview,
                }
            })
            .collect();

        // First submission seen per campaign when scanning newest-first,
        // which is that campaign's most recent created_at.
        let activity_sql = format!(
            "SELECT DISTINCT ON (s.campaign_id)
                    s.campaign_id, c.name, c.status, c.icon, s.created_at AS last_accessed
             FROM {sub} s JOIN {camp} c ON c.id = s.campaign_id
             WHERE s.submitted_by = $1{scope_cond}
             ORDER BY s.campaign_id, s.created_at DESC",
            sub = entry.submission_table,
            camp = entry.campaign_table,
        );
        let mut q = sqlx::query(&activity_sql).bind(user_id);
        if let Some(ids) = scope {
            q = q.bind(ids.to_vec());
        }
        let activity = q
            .fetch_all(pool)
            .await?
            .iter()
            .map(|row| {
                let campaign_id: i64 = row.get("campaign_id");
                RecentCampaign {
                    campaign_id,
                    name: row.get("name"),
                    kind: entry.kind,
                    status: row.get("status"),
                    icon: row.get("icon"),
                    last_accessed: row.get("last_accessed"),
                    submission_count: counts.get(&campaign_id).copied().unwrap_or(0),
                }
            })
            .collect();

        let month_sql = format!(
            "SELECT COUNT(*) FROM {sub} s
             WHERE s.submitted_by = $1{scope_cond}
               AND date_trunc('month', s.created_at) = date_trunc('month', NOW())",
            sub = entry.submission_table,
        );
        let mut q = sqlx::query_scalar::<_, i64>(&month_sql).bind(user_id);
        if let Some(ids) = scope {
            q = q.bind(ids.to_vec());
        }
        let month_count = q.fetch_one(pool).await?;

        Ok((recents, activity, month_count))
    }

    async fn counts_by_campaign(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user_id: i64,
    ) -> anyhow::Result<HashMap<i64, i64>> {
        let rows = sqlx::query(&format!(
            "SELECT campaign_id, COUNT(*) AS n FROM {}
             WHERE submitted_by = $1 GROUP BY campaign_id",
            entry.submission_table
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| (r.get::<i64, _>("campaign_id"), r.get::<i64, _>("n")))
            .collect())
    }

    /// Flat list of a manager's assigned campaigns with the total submission
    /// count per campaign (all submitters, not just the manager).
    async fn assigned_campaigns(
        pool: &PgPool,
        assignments: &HashMap<CampaignKind, Vec<i64>>,
    ) -> anyhow::Result<Vec<Value>> {
        let mut out = Vec::new();
        for (kind, ids) in assignments {
            let entry = kind.entry();
            for campaign_id in ids {
                let campaign = sqlx::query_as::<_, Campaign>(&format!(
                    "SELECT * FROM {} WHERE id = $1",
                    entry.campaign_table
                ))
                .bind(campaign_id)
                .fetch_optional(pool)
                .await?;
                let Some(campaign) = campaign else {
                    continue;
                };
                let submission_count: i64 = sqlx::query_scalar(&format!(
                    "SELECT COUNT(*) FROM {} WHERE campaign_id = $1",
                    entry.submission_table
                ))
                .bind(campaign_id)
                .fetch_one(pool)
                .await?;
                out.push(json!({
                    "id": campaign.id,
                    "name": campaign.name,
                    "campaign_type": entry.display_name,
                    "campaign_type_slug": entry.slug,
                    "status": campaign.status,
                    "icon": campaign.icon,
                    "submission_count": submission_count,
                }));
            }
        }
        out.sort_by(|a, b| {
            let ka = a["campaign_type_slug"].as_str().unwrap_or_default().to_string();
            let kb = b["campaign_type_slug"].as_str().unwrap_or_default().to_string();
            (ka, a["id"].as_i64()).cmp(&(kb, b["id"].as_i64()))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sub(id: i64, campaign_id: i64, kind: CampaignKind, ts: i64) -> RecentSubmission {
        RecentSubmission {
            id,
            campaign_id,
            campaign_name: Some(format!("c{campaign_id}")),
            kind,
            submission_period: None,
            created_at: Utc.timestamp_opt(ts, 0).unwrap(),
            submission_count: 1,
            preview: Map::new(),
        }
    }

    #[test]
    fn recent_submissions_are_deduped_and_capped() {
        let mut input = Vec::new();
        // Two submissions to the same campaign; only the newer survives.
        input.push(sub(1, 10, CampaignKind::SoulWinning, 100));
        input.push(sub(2, 10, CampaignKind::SoulWinning, 200));
        // Same numeric id under a different kind is a distinct pair.
        input.push(sub(3, 10, CampaignKind::Testimony, 150));
        for i in 0..6 {
            input.push(sub(10 + i, 20 + i, CampaignKind::Tangerine, 300 + i));
        }

        let folded = fold_recent_submissions(input);
        assert_eq!(folded.len(), 5);
        let pairs: HashSet<_> = folded.iter().map(|s| (s.campaign_id, s.kind)).collect();
        assert_eq!(pairs.len(), 5);
        // Newest first.
        assert!(folded.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        // The duplicate campaign kept its most recent submission.
        if let Some(s) = folded
            .iter()
            .find(|s| s.campaign_id == 10 && s.kind == CampaignKind::SoulWinning)
        {
            assert_eq!(s.id, 2);
        }
    }

    #[test]
    fn recent_campaigns_are_capped_at_five() {
        let camps: Vec<RecentCampaign> = (0..8)
            .map(|i| RecentCampaign {
                campaign_id: i,
                name: None,
                kind: CampaignKind::Equipment,
                status: "ACTIVE".into(),
                icon: None,
                last_accessed: Utc.timestamp_opt(100 + i, 0).unwrap(),
                submission_count: 0,
            })
            .collect();
        let folded = fold_recent_campaigns(camps);
        assert_eq!(folded.len(), 5);
        assert_eq!(folded[0].campaign_id, 7);
    }

    #[test]
    fn manager_scope_skips_unassigned_kinds() {
        let mut map = HashMap::new();
        map.insert(CampaignKind::SoulWinning, vec![7i64]);
        let assignments = Some(map);

        assert!(kind_scope(&assignments, CampaignKind::Testimony).is_none());
        let scope = kind_scope(&assignments, CampaignKind::SoulWinning).unwrap();
        assert_eq!(scope.unwrap(), &[7i64][..]);

        // Non-managers are unrestricted for every kind.
        assert_eq!(kind_scope(&None, CampaignKind::Testimony), Some(None));
    }
}
