use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

const TREND_MONTHS: usize = 12;

/// Reporting window. `start = None` means "all time".
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub start: Option<DateTime<Utc>>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// The window as inclusive calendar dates, for filtering DATE columns.
    fn dates(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.start.map(|s| (s.date_naive(), self.end.date_naive()))
    }

    /// The immediately preceding window of equal duration.
    pub fn previous(&self) -> Option<Window> {
        self.start.map(|start| {
            let duration = self.end - start;
            Window {
                start: Some(start - duration),
                end: start,
            }
        })
    }
}

/// Resolve a `period` query parameter into a window anchored at `now`.
/// Unknown values fall back to all-time, matching the permissive handling
/// of the period parameter elsewhere in the API.
pub fn period_window(period: &str, now: DateTime<Utc>) -> Window {
    let midnight =
        |d: NaiveDate| Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    let today = now.date_naive();

    let start = match period {
        "week" => Some(now - chrono::Duration::days(7)),
        "month" => Some(midnight(
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1).expect("first of month"),
        )),
        "quarter" => {
            let quarter = (today.month() - 1) / 3;
            Some(midnight(
                NaiveDate::from_ymd_opt(today.year(), quarter * 3 + 1, 1).expect("quarter start"),
            ))
        }
        "year" => Some(midnight(
            NaiveDate::from_ymd_opt(today.year(), 1, 1).expect("year start"),
        )),
        _ => None,
    };

    Window { start, end: now }
}

/// Explicit start/end dates override the named period. Returns None when
/// either date fails to parse; the caller turns that into a client error.
pub fn custom_window(start: &str, end: &str) -> Option<Window> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?;
    Some(Window {
        start: Some(Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0)?)),
        end: Utc.from_utc_datetime(&end.and_hms_opt(23, 59, 59)?),
    })
}

fn month_floor(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1).expect("first of month is valid")
}

fn month_key(d: NaiveDate) -> String {
    d.format("%Y-%m").to_string()
}

fn month_label(d: NaiveDate) -> String {
    d.format("%b %Y").to_string()
}

fn growth_percentage(current: i64, previous: i64) -> f64 {
    if previous > 0 {
        (current - previous) as f64 / previous as f64 * 100.0
    } else {
        0.0
    }
}

/// Keep the most recent 12 months, oldest first.
fn last_months_ascending<V>(map: BTreeMap<NaiveDate, V>) -> Vec<(NaiveDate, V)> {
    let skip = map.len().saturating_sub(TREND_MONTHS);
    map.into_iter().skip(skip).collect()
}

async fn sum_i64(
    pool: &PgPool,
    table: &str,
    col: &str,
    date_col: &str,
    user_id: i64,
    window: Option<(NaiveDate, NaiveDate)>,
) -> anyhow::Result<i64> {
    let mut sql = format!("SELECT SUM({col})::BIGINT FROM {table} WHERE submitted_by = $1");
    if window.is_some() {
        sql.push_str(&format!(" AND {date_col} >= $2 AND {date_col} <= $3"));
    }
    let mut q = sqlx::query_scalar::<_, Option<i64>>(&sql).bind(user_id);
    if let Some((s, e)) = window {
        q = q.bind(s).bind(e);
    }
    Ok(q.fetch_one(pool).await?.unwrap_or(0))
}

async fn sum_f64(
    pool: &PgPool,
    table: &str,
    col: &str,
    date_col: &str,
    user_id: i64,
    window: Option<(NaiveDate, NaiveDate)>,
) -> anyhow::Result<f64> {
    let mut sql =
        format!("SELECT SUM({col})::DOUBLE PRECISION FROM {table} WHERE submitted_by = $1");
    if window.is_some() {
        sql.push_str(&format!(" AND {date_col} >= $2 AND {date_col} <= $3"));
    }
    let mut q = sqlx::query_scalar::<_, Option<f64>>(&sql).bind(user_id);
    if let Some((s, e)) = window {
        q = q.bind(s).bind(e);
    }
    Ok(q.fetch_one(pool).await?.unwrap_or(0.0))
}

async fn avg_f64(
    pool: &PgPool,
    table: &str,
    col: &str,
    date_col: &str,
    user_id: i64,
    window: Option<(NaiveDate, NaiveDate)>,
) -> anyhow::Result<f64> {
    let mut sql =
        format!("SELECT AVG({col})::DOUBLE PRECISION FROM {table} WHERE submitted_by = $1");
    if window.is_some() {
        sql.push_str(&format!(" AND {date_col} >= $2 AND {date_col} <= $3"));
    }
    let mut q = sqlx::query_scalar::<_, Option<f64>>(&sql).bind(user_id);
    if let Some((s, e)) = window {
        q = q.bind(s).bind(e);
    }
    Ok(q.fetch_one(pool).await?.unwrap_or(0.0))
}

pub struct AnalyticsService;

impl AnalyticsService {
    pub async fn analytics(
        pool: &PgPool,
        user_id: i64,
        period_type: &str,
        window: Window,
    ) -> anyhow::Result<Value> {
        let prev = window.previous();

        let membership = Self::membership(pool, user_id, &window).await?;
        let soul_winning = Self::soul_winning(pool, user_id, &window, prev.as_ref()).await?;
        let (leadership, latest_group) = tokio::try_join!(
            Self::leadership(pool, user_id, &window),
            Self::latest_small_group(pool, user_id),
        )?;
        let small_groups = Self::small_groups(pool, user_id, latest_group.as_ref()).await?;
        let attendance =
            Self::attendance(pool, user_id, &window, latest_group.as_ref()).await?;
        let engagement = Self::engagement(pool, user_id, &window).await?;
        let member_care = Self::member_care(pool, user_id, &window).await?;
        let prayer = Self::prayer(pool, user_id, &window).await?;
        let outreach = Self::outreach(pool, user_id, &window).await?;

        Ok(json!({
            "period": {
                "type": period_type,
                "start": window.start.map(|s| s.to_rfc3339()),
                "end": window.end.to_rfc3339(),
            },
            "membership": membership,
            "soul_winning": soul_winning,
            "leadership": leadership,
            "small_groups": small_groups,
            "attendance": attendance,
            "engagement": engagement,
            "member_care": member_care,
            "prayer": prayer,
            "outreach": outreach,
        }))
    }

    async fn membership(pool: &PgPool, user_id: i64, window: &Window) -> anyhow::Result<Value> {
        let latest = sqlx::query(
            "SELECT total_membership, stable, unstable, lost FROM submission_sof
             WHERE submitted_by = $1
             ORDER BY submission_period DESC NULLS LAST, created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let mut current = 0i64;
        let mut stable = 0i64;
        let mut unstable = 0i64;
        let mut lost = 0i64;
        let mut previous = 0i64;

        if let Some(row) = &latest {
            current = row.get::<Option<i32>, _>("total_membership").unwrap_or(0) as i64;
            stable = row.get::<Option<i32>, _>("stable").unwrap_or(0) as i64;
            unstable = row.get::<Option<i32>, _>("unstable").unwrap_or(0) as i64;
            lost = row.get::<Option<i32>, _>("lost").unwrap_or(0) as i64;

            // Second most recent dated submission is the comparison point;
            // fall back to the last one before the window.
            let dated: Vec<Option<i32>> = sqlx::query_scalar(
                "SELECT total_membership FROM submission_sof
                 WHERE submitted_by = $1 AND submission_period IS NOT NULL
                 ORDER BY submission_period DESC, created_at DESC
                 LIMIT 2",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await?;

            if dated.len() > 1 {
                previous = dated[1].unwrap_or(0) as i64;
            } else if let Some(start) = window.start {
                let before: Option<Option<i32>> = sqlx::query_scalar(
                    "SELECT total_membership FROM submission_sof
                     WHERE submitted_by = $1 AND submission_period IS NOT NULL
                       AND submission_period < $2
                     ORDER BY submission_period DESC, created_at DESC
                     LIMIT 1",
                )
                .bind(user_id)
                .bind(start.date_naive())
                .fetch_optional(pool)
                .await?;
                previous = before.flatten().unwrap_or(0) as i64;
            }
        }

        let rows = sqlx::query(
            "SELECT submission_period, total_membership, stable, unstable, lost
             FROM submission_sof
             WHERE submitted_by = $1 AND submission_period IS NOT NULL
             ORDER BY submission_period DESC
             LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let trend: Vec<Value> = rows
            .iter()
            .rev()
            .map(|row| {
                let period: NaiveDate = row.get("submission_period");
                json!({
                    "period": month_key(period),
                    "label": month_label(period),
                    "total": row.get::<Option<i32>, _>("total_membership").unwrap_or(0),
                    "stable": row.get::<Option<i32>, _>("stable").unwrap_or(0),
                    "unstable": row.get::<Option<i32>, _>("unstable").unwrap_or(0),
                    "lost": row.get::<Option<i32>, _>("lost").unwrap_or(0),
                })
            })
            .collect();

        Ok(json!({
            "current": current,
            "previous": previous,
            "growth": current - previous,
            "growth_percentage": growth_percentage(current, previous),
            "stable": stable,
            "unstable": unstable,
            "lost": lost,
            "trend": trend,
        }))
    }

    async fn soul_winning(
        pool: &PgPool,
        user_id: i64,
        window: &Window,
        prev: Option<&Window>,
    ) -> anyhow::Result<Value> {
        let total_all_time =
            sum_i64(pool, "submission_swc", "no_of_souls_won", "date", user_id, None).await?;

        let mut sql = String::from(
            "SELECT SUM(no_of_souls_won)::BIGINT AS total,
                    SUM(no_of_crusades)::BIGINT AS crusades,
                    SUM(no_of_massive_organised_outreaches)::BIGINT AS outreaches,
                    SUM(no_of_dance_outreach)::BIGINT AS dance_outreach,
                    SUM(no_of_missionaries_sent)::BIGINT AS missionaries_sent
             FROM submission_swc WHERE submitted_by = $1",
        );
        if window.dates().is_some() {
            sql.push_str(" AND date >= $2 AND date <= $3");
        }
        let mut q = sqlx::query(&sql).bind(user_id);
        if let Some((s, e)) = window.dates() {
            q = q.bind(s).bind(e);
        }
        let sums = q.fetch_one(pool).await?;

        let previous_period = match prev.and_then(|w| w.dates()) {
            Some(range) => {
                sum_i64(pool, "submission_swc", "no_of_souls_won", "date", user_id, Some(range))
                    .await?
            }
            None => 0,
        };

        let rows = sqlx::query(
            "SELECT date, no_of_souls_won, no_of_crusades, no_of_massive_organised_outreaches,
                    no_of_dance_outreach, no_of_missionaries_sent
             FROM submission_swc
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC
             LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let trend: Vec<Value> = rows
            .iter()
            .rev()
            .map(|row| {
                let d: NaiveDate = row.get("date");
                json!({
                    "period": month_key(d),
                    "label": month_label(d),
                    "souls_won": row.get::<Option<i32>, _>("no_of_souls_won").unwrap_or(0),
                    "crusades": row.get::<Option<i32>, _>("no_of_crusades").unwrap_or(0),
                    "outreaches": row.get::<Option<i32>, _>("no_of_massive_organised_outreaches").unwrap_or(0),
                    "dance_outreach": row.get::<Option<i32>, _>("no_of_dance_outreach").unwrap_or(0),
                    "missionaries_sent": row.get::<Option<i32>, _>("no_of_missionaries_sent").unwrap_or(0),
                })
            })
            .collect();

        let mut cumulative = 0i64;
        let cumulative_trend: Vec<Value> = trend
            .iter()
            .map(|item| {
                cumulative += item["souls_won"].as_i64().unwrap_or(0);
                json!({
                    "period": item["period"],
                    "label": item["label"],
                    "cumulative": cumulative,
                })
            })
            .collect();

        Ok(json!({
            "total_all_time": total_all_time,
            "this_period": sums.get::<Option<i64>, _>("total").unwrap_or(0),
            "previous_period": previous_period,
            "crusades": sums.get::<Option<i64>, _>("crusades").unwrap_or(0),
            "outreaches": sums.get::<Option<i64>, _>("outreaches").unwrap_or(0),
            "dance_outreach": sums.get::<Option<i64>, _>("dance_outreach").unwrap_or(0),
            "missionaries_sent": sums.get::<Option<i64>, _>("missionaries_sent").unwrap_or(0),
            "trend": trend,
            "cumulative_trend": cumulative_trend,
        }))
    }

    async fn leadership(pool: &PgPool, user_id: i64, window: &Window) -> anyhow::Result<Value> {
        let range = window.dates();
        let teaching_sessions = sum_i64(
            pool, "submission_sat", "no_of_teachings_done_by_pastor", "date", user_id, range,
        )
        .await?;
        let avg_attendance = avg_f64(
            pool,
            "submission_sat",
            "average_attendance_during_meetings_by_pastor",
            "date",
            user_id,
            range,
        )
        .await?;
        let makarios = sum_i64(
            pool, "submission_sat", "no_of_leaders_who_have_makarios", "date", user_id, range,
        )
        .await?;
        let dakes = sum_i64(
            pool, "submission_sat", "no_of_leaders_who_own_dakes_bible", "date", user_id, range,
        )
        .await?;
        let thompson = sum_i64(
            pool, "submission_sat", "no_of_leaders_who_own_thompson_chain", "date", user_id, range,
        )
        .await?;
        let pose = sum_i64(
            pool, "submission_sat", "no_of_pose_certified_leaders", "date", user_id, range,
        )
        .await?;
        let iptp = sum_i64(
            pool, "submission_sat", "no_of_leaders_in_iptp_training", "date", user_id, range,
        )
        .await?;

        let hierarchy_row = sqlx::query(
            "SELECT current_no_of_leaders, no_of_cos, no_of_bos, no_of_bls, no_of_fls,
                    no_of_potential_leaders
             FROM submission_shc
             WHERE submitted_by = $1
             ORDER BY submission_period DESC NULLS LAST, created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let get = |col: &str| -> i64 {
            hierarchy_row
                .as_ref()
                .and_then(|r| r.get::<Option<i32>, _>(col))
                .unwrap_or(0) as i64
        };

        Ok(json!({
            "total_leaders": get("current_no_of_leaders"),
            "teaching_sessions": teaching_sessions,
            "avg_attendance": avg_attendance,
            "hierarchy": {
                "cos": get("no_of_cos"),
                "bos": get("no_of_bos"),
                "bls": get("no_of_bls"),
                "fls": get("no_of_fls"),
                "potential_leaders": get("no_of_potential_leaders"),
            },
            "training_metrics": {
                "makarios": makarios,
                "dakes_bible": dakes,
                "thompson_chain": thompson,
                "pose_certified": pose,
                "iptp_training": iptp,
            },
        }))
    }

    async fn latest_small_group(
        pool: &PgPool,
        user_id: i64,
    ) -> anyhow::Result<Option<sqlx::postgres::PgRow>> {
        Ok(sqlx::query(
            "SELECT current_number_of_bacentas, no_of_basontas, no_of_new_bacentas,
                    average_no_of_people_at_bacenta_meeting, avg_no_of_members_saturday_service,
                    avg_no_of_members_sunday_service
             FROM submission_bsp
             WHERE submitted_by = $1
             ORDER BY submission_period DESC NULLS LAST, created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
    }

    async fn small_groups(
        pool: &PgPool,
        user_id: i64,
        latest: Option<&sqlx::postgres::PgRow>,
    ) -> anyhow::Result<Value> {
        let get = |col: &str| -> i64 {
            latest
                .and_then(|r| r.get::<Option<i32>, _>(col))
                .unwrap_or(0) as i64
        };

        let rows = sqlx::query(
            "SELECT submission_period, current_number_of_bacentas, no_of_basontas,
                    no_of_new_bacentas, average_no_of_people_at_bacenta_meeting,
                    avg_no_of_members_saturday_service, avg_no_of_members_sunday_service
             FROM submission_bsp
             WHERE submitted_by = $1 AND submission_period IS NOT NULL
             ORDER BY submission_period DESC
             LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let trend: Vec<Value> = rows
            .iter()
            .rev()
            .map(|row| {
                let period: NaiveDate = row.get("submission_period");
                json!({
                    "period": month_key(period),
                    "label": month_label(period),
                    "bacentas": row.get::<Option<i32>, _>("current_number_of_bacentas").unwrap_or(0),
                    "basontas": row.get::<Option<i32>, _>("no_of_basontas").unwrap_or(0),
                    "new_groups": row.get::<Option<i32>, _>("no_of_new_bacentas").unwrap_or(0),
                    "avg_attendance": row.get::<Option<i32>, _>("average_no_of_people_at_bacenta_meeting").unwrap_or(0),
                    "avg_saturday": row.get::<Option<i32>, _>("avg_no_of_members_saturday_service").unwrap_or(0),
                    "avg_sunday": row.get::<Option<i32>, _>("avg_no_of_members_sunday_service").unwrap_or(0),
                })
            })
            .collect();

        Ok(json!({
            "bacentas": get("current_number_of_bacentas"),
            "basontas": get("no_of_basontas"),
            "new_groups": get("no_of_new_bacentas"),
            "avg_attendance": get("average_no_of_people_at_bacenta_meeting"),
            "avg_saturday": get("avg_no_of_members_saturday_service"),
            "avg_sunday": get("avg_no_of_members_sunday_service"),
            "trend": trend,
        }))
    }

    async fn attendance(
        pool: &PgPool,
        user_id: i64,
        window: &Window,
        latest_group: Option<&sqlx::postgres::PgRow>,
    ) -> anyhow::Result<Value> {
        let range = window.dates();
        let avg_service = avg_f64(
            pool, "submission_gbc", "avg_attendance_for_the_service", "date", user_id, range,
        )
        .await?;
        let avg_bused = avg_f64(
            pool, "submission_gbc", "avg_number_of_members_bused", "date", user_id, range,
        )
        .await?;
        let avg_walk_in = avg_f64(
            pool, "submission_gbc", "avg_number_of_members_who_walk_in", "date", user_id, range,
        )
        .await?;
        let first_timers = sum_i64(
            pool, "submission_gbc", "avg_number_of_first_timers", "date", user_id, range,
        )
        .await?;

        let swollen_attendance = sum_i64(
            pool,
            "submission_ss",
            "attendance_for_swollen_sunday",
            "submission_period",
            user_id,
            range,
        )
        .await?;
        let swollen_converts = sum_i64(
            pool,
            "submission_ss",
            "no_of_converts_for_swollen_sunday",
            "submission_period",
            user_id,
            range,
        )
        .await?;

        let avg_sunday = latest_group
            .and_then(|r| r.get::<Option<i32>, _>("avg_no_of_members_sunday_service"))
            .unwrap_or(0) as i64;

        let rows = sqlx::query(
            "SELECT date, avg_attendance_for_the_service, avg_number_of_members_bused,
                    avg_number_of_members_who_walk_in, avg_number_of_first_timers
             FROM submission_gbc
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC
             LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let trend: Vec<Value> = rows
            .iter()
            .rev()
            .map(|row| {
                let d: NaiveDate = row.get("date");
                json!({
                    "period": month_key(d),
                    "label": month_label(d),
                    "avg_service": row.get::<Option<i32>, _>("avg_attendance_for_the_service").unwrap_or(0),
                    "avg_bused": row.get::<Option<i32>, _>("avg_number_of_members_bused").unwrap_or(0),
                    "avg_walk_in": row.get::<Option<i32>, _>("avg_number_of_members_who_walk_in").unwrap_or(0),
                    "first_timers": row.get::<Option<i32>, _>("avg_number_of_first_timers").unwrap_or(0),
                })
            })
            .collect();

        Ok(json!({
            "avg_service": avg_service,
            "avg_bused": avg_bused,
            "avg_walk_in": avg_walk_in,
            "avg_sunday": avg_sunday,
            "first_timers": first_timers,
            "swollen_sunday": {
                "attendance": swollen_attendance,
                "converts": swollen_converts,
            },
            "trend": trend,
        }))
    }

    async fn engagement(pool: &PgPool, user_id: i64, window: &Window) -> anyhow::Result<Value> {
        let range = window.dates();
        let youtube = sum_i64(
            pool,
            "submission_hs",
            "no_of_people_subscribed_bishop_dag_youtube",
            "date",
            user_id,
            range,
        )
        .await?;
        let podcast = sum_i64(
            pool,
            "submission_hs",
            "no_of_people_subscribed_es_joys_podcast",
            "date",
            user_id,
            range,
        )
        .await?;
        let messages = sum_i64(
            pool, "submission_hs", "no_of_messages_listened_to", "date", user_id, range,
        )
        .await?;
        let testimonies = sum_i64(
            pool, "submission_tes", "number_of_testimonies_shared", "date", user_id, range,
        )
        .await?;
        let lay_school_attendance = avg_f64(
            pool,
            "submission_uc",
            "average_attendance_at_lay_school_meeting",
            "date",
            user_id,
            range,
        )
        .await?;
        let lay_school_teachers = sum_i64(
            pool, "submission_uc", "no_of_lay_school_teachers", "date", user_id, range,
        )
        .await?;

        #[derive(Default)]
        struct MonthRow {
            youtube: i64,
            podcast: i64,
            messages: i64,
            testimonies: i64,
        }

        let mut by_month: BTreeMap<NaiveDate, MonthRow> = BTreeMap::new();

        let hs_rows = sqlx::query(
            "SELECT date, no_of_people_subscribed_bishop_dag_youtube,
                    no_of_people_subscribed_es_joys_podcast, no_of_messages_listened_to
             FROM submission_hs
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        for row in &hs_rows {
            let month = month_floor(row.get("date"));
            let bucket = by_month.entry(month).or_default();
            bucket.youtube += row
                .get::<Option<i32>, _>("no_of_people_subscribed_bishop_dag_youtube")
                .unwrap_or(0) as i64;
            bucket.podcast += row
                .get::<Option<i32>, _>("no_of_people_subscribed_es_joys_podcast")
                .unwrap_or(0) as i64;
            bucket.messages += row
                .get::<Option<i32>, _>("no_of_messages_listened_to")
                .unwrap_or(0) as i64;
        }

        let tes_rows = sqlx::query(
            "SELECT date, number_of_testimonies_shared FROM submission_tes
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        for row in &tes_rows {
            let month = month_floor(row.get("date"));
            by_month.entry(month).or_default().testimonies += row
                .get::<Option<i32>, _>("number_of_testimonies_shared")
                .unwrap_or(0) as i64;
        }

        let trend: Vec<Value> = last_months_ascending(by_month)
            .into_iter()
            .map(|(month, b)| {
                json!({
                    "period": month_key(month),
                    "label": month_label(month),
                    "youtube_subscribers": b.youtube,
                    "podcast_subscribers": b.podcast,
                    "messages_listened": b.messages,
                    "testimonies_shared": b.testimonies,
                })
            })
            .collect();

        Ok(json!({
            "youtube_subscribers": youtube,
            "podcast_subscribers": podcast,
            "messages_listened": messages,
            "testimonies_shared": testimonies,
            "lay_school_attendance": lay_school_attendance,
            "lay_school_teachers": lay_school_teachers,
            "trend": trend,
        }))
    }

    async fn member_care(pool: &PgPool, user_id: i64, window: &Window) -> anyhow::Result<Value> {
        let range = window.dates();
        let counseled = sum_i64(
            pool,
            "submission_inc",
            "total_number_of_members_counseled",
            "submission_period",
            user_id,
            range,
        )
        .await?;
        let in_person = sum_i64(
            pool,
            "submission_inc",
            "no_of_members_counseled_in_person",
            "submission_period",
            user_id,
            range,
        )
        .await?;
        let via_calls = sum_i64(
            pool,
            "submission_inc",
            "no_of_members_counseled_via_calls",
            "submission_period",
            user_id,
            range,
        )
        .await?;
        let calls_made = sum_i64(
            pool, "submission_tel", "total_no_of_calls_made", "date", user_id, range,
        )
        .await?;
        let telepastors = sum_i64(
            pool, "submission_tel", "no_of_telepastors", "date", user_id, range,
        )
        .await?;

        let total_members: Option<Option<i32>> = sqlx::query_scalar(
            "SELECT total_number_of_members FROM submission_inc
             WHERE submitted_by = $1
             ORDER BY submission_period DESC NULLS LAST, created_at DESC
             LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        let total_members = total_members.flatten().unwrap_or(0) as i64;
        let counseling_coverage = if total_members > 0 {
            counseled as f64 / total_members as f64 * 100.0
        } else {
            0.0
        };

        #[derive(Default)]
        struct MonthRow {
            counseled: i64,
            in_person: i64,
            via_calls: i64,
            calls_made: i64,
        }

        let mut by_month: BTreeMap<NaiveDate, MonthRow> = BTreeMap::new();

        let inc_rows = sqlx::query(
            "SELECT submission_period, total_number_of_members_counseled,
                    no_of_members_counseled_in_person, no_of_members_counseled_via_calls
             FROM submission_inc
             WHERE submitted_by = $1 AND submission_period IS NOT NULL
             ORDER BY submission_period DESC LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        for row in &inc_rows {
            let month = month_floor(row.get("submission_period"));
            let bucket = by_month.entry(month).or_default();
            bucket.counseled += row
                .get::<Option<i32>, _>("total_number_of_members_counseled")
                .unwrap_or(0) as i64;
            bucket.in_person += row
                .get::<Option<i32>, _>("no_of_members_counseled_in_person")
                .unwrap_or(0) as i64;
            bucket.via_calls += row
                .get::<Option<i32>, _>("no_of_members_counseled_via_calls")
                .unwrap_or(0) as i64;
        }

        let tel_rows = sqlx::query(
            "SELECT date, total_no_of_calls_made FROM submission_tel
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        for row in &tel_rows {
            let month = month_floor(row.get("date"));
            by_month.entry(month).or_default().calls_made += row
                .get::<Option<i32>, _>("total_no_of_calls_made")
                .unwrap_or(0) as i64;
        }

        let trend: Vec<Value> = last_months_ascending(by_month)
            .into_iter()
            .map(|(month, b)| {
                json!({
                    "period": month_key(month),
                    "label": month_label(month),
                    "members_counseled": b.counseled,
                    "in_person": b.in_person,
                    "via_calls": b.via_calls,
                    "calls_made": b.calls_made,
                })
            })
            .collect();

        Ok(json!({
            "members_counseled": counseled,
            "counseling_coverage": counseling_coverage,
            "calls_made": calls_made,
            "telepastors": telepastors,
            "in_person": in_person,
            "via_calls": via_calls,
            "trend": trend,
        }))
    }

    async fn prayer(pool: &PgPool, user_id: i64, window: &Window) -> anyhow::Result<Value> {
        let range = window.dates();
        let hours_prayed =
            sum_f64(pool, "submission_ant", "hours_prayed", "date", user_id, range).await?;
        let participants = sum_i64(
            pool, "submission_ant", "number_of_people_who_prayed", "date", user_id, range,
        )
        .await?;

        #[derive(Default)]
        struct MonthRow {
            hours: f64,
            participants: i64,
        }

        let mut by_month: BTreeMap<NaiveDate, MonthRow> = BTreeMap::new();
        let rows = sqlx::query(
            "SELECT date, hours_prayed, number_of_people_who_prayed FROM submission_ant
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        for row in &rows {
            let month = month_floor(row.get("date"));
            let bucket = by_month.entry(month).or_default();
            bucket.hours += row.get::<Option<f64>, _>("hours_prayed").unwrap_or(0.0);
            bucket.participants += row
                .get::<Option<i32>, _>("number_of_people_who_prayed")
                .unwrap_or(0) as i64;
        }

        let trend: Vec<Value> = last_months_ascending(by_month)
            .into_iter()
            .map(|(month, b)| {
                json!({
                    "period": month_key(month),
                    "label": month_label(month),
                    "hours_prayed": b.hours,
                    "participants": b.participants,
                })
            })
            .collect();

        Ok(json!({
            "hours_prayed": hours_prayed,
            "participants": participants,
            "trend": trend,
        }))
    }

    async fn outreach(pool: &PgPool, user_id: i64, window: &Window) -> anyhow::Result<Value> {
        let range = window.dates();
        let total_outreaches =
            sum_i64(pool, "submission_mult", "no_of_outreaches", "date", user_id, range).await?;
        let members_from_outreaches = sum_i64(
            pool,
            "submission_mult",
            "no_of_members_who_came_from_outreaches_to_church",
            "date",
            user_id,
            range,
        )
        .await?;
        let total_invites = sum_i64(
            pool, "submission_mult", "no_of_invites_done", "date", user_id, range,
        )
        .await?;
        let people_visited = sum_i64(
            pool, "submission_shs", "no_of_people_visited", "date", user_id, range,
        )
        .await?;
        let first_time_retained = sum_i64(
            pool, "submission_shs", "no_of_first_time_retained", "date", user_id, range,
        )
        .await?;
        let converts_retained = sum_i64(
            pool, "submission_shs", "no_of_converts_retained", "date", user_id, range,
        )
        .await?;

        #[derive(Default)]
        struct MonthRow {
            outreaches: i64,
            members_from_outreaches: i64,
            invites: i64,
            people_visited: i64,
            first_time_retained: i64,
            converts_retained: i64,
        }

        let mut by_month: BTreeMap<NaiveDate, MonthRow> = BTreeMap::new();

        let mult_rows = sqlx::query(
            "SELECT date, no_of_outreaches, no_of_members_who_came_from_outreaches_to_church,
                    no_of_invites_done
             FROM submission_mult
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        for row in &mult_rows {
            let month = month_floor(row.get("date"));
            let bucket = by_month.entry(month).or_default();
            bucket.outreaches += row.get::<Option<i32>, _>("no_of_outreaches").unwrap_or(0) as i64;
            bucket.members_from_outreaches += row
                .get::<Option<i32>, _>("no_of_members_who_came_from_outreaches_to_church")
                .unwrap_or(0) as i64;
            bucket.invites += row.get::<Option<i32>, _>("no_of_invites_done").unwrap_or(0) as i64;
        }

        let shs_rows = sqlx::query(
            "SELECT date, no_of_people_visited, no_of_first_time_retained, no_of_converts_retained
             FROM submission_shs
             WHERE submitted_by = $1 AND date IS NOT NULL
             ORDER BY date DESC LIMIT 12",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        for row in &shs_rows {
            let month = month_floor(row.get("date"));
            let bucket = by_month.entry(month).or_default();
            bucket.people_visited += row
                .get::<Option<i32>, _>("no_of_people_visited")
                .unwrap_or(0) as i64;
            bucket.first_time_retained += row
                .get::<Option<i32>, _>("no_of_first_time_retained")
                .unwrap_or(0) as i64;
            bucket.converts_retained += row
                .get::<Option<i32>, _>("no_of_converts_retained")
                .unwrap_or(0) as i64;
        }

        let trend: Vec<Value> = last_months_ascending(by_month)
            .into_iter()
            .map(|(month, b)| {
                json!({
                    "period": month_key(month),
                    "label": month_label(month),
                    "outreaches": b.outreaches,
                    "members_from_outreaches": b.members_from_outreaches,
                    "invites": b.invites,
                    "people_visited": b.people_visited,
                    "first_time_retained": b.first_time_retained,
                    "converts_retained": b.converts_retained,
                })
            })
            .collect();

        Ok(json!({
            "total_outreaches": total_outreaches,
            "members_from_outreaches": members_from_outreaches,
            "total_invites": total_invites,
            "people_visited": people_visited,
            "first_time_retained": first_time_retained,
            "converts_retained": converts_retained,
            "trend": trend,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn quarter_window_starts_at_quarter_boundary() {
        let now = utc(2025, 5, 15, 12);
        let w = period_window("quarter", now);
        assert_eq!(w.start.unwrap(), utc(2025, 4, 1, 0));
        assert_eq!(w.end, now);
    }

    #[test]
    fn previous_window_has_equal_duration() {
        let now = utc(2025, 5, 15, 12);
        let w = period_window("quarter", now);
        let prev = w.previous().unwrap();
        assert_eq!(prev.end, w.start.unwrap());
        assert_eq!(prev.end - prev.start.unwrap(), w.end - w.start.unwrap());
    }

    #[test]
    fn month_year_and_week_windows() {
        let now = utc(2025, 5, 15, 12);
        assert_eq!(period_window("month", now).start.unwrap(), utc(2025, 5, 1, 0));
        assert_eq!(period_window("year", now).start.unwrap(), utc(2025, 1, 1, 0));
        assert_eq!(
            period_window("week", now).start.unwrap(),
            now - chrono::Duration::days(7)
        );
        assert!(period_window("all", now).start.is_none());
        // Unknown values behave like "all".
        assert!(period_window("fortnight", now).start.is_none());
    }

    #[test]
    fn all_time_window_has_no_previous() {
        let w = period_window("all", utc(2025, 5, 15, 12));
        assert!(w.previous().is_none());
    }

    #[test]
    fn custom_window_parses_and_rejects() {
        let w = custom_window("2025-01-01", "2025-03-31").unwrap();
        assert_eq!(w.start.unwrap().date_naive(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(w.end.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert!(custom_window("01/01/2025", "2025-03-31").is_none());
        assert!(custom_window("2025-01-01", "bogus").is_none());
    }

    #[test]
    fn growth_percentage_guards_division_by_zero() {
        assert_eq!(growth_percentage(135, 0), 0.0);
        assert!((growth_percentage(135, 120) - 12.5).abs() < 1e-9);
        assert!((growth_percentage(100, 120) - (-16.666_666_666_666_664)).abs() < 1e-9);
    }

    #[test]
    fn month_trend_is_ascending_and_capped() {
        let mut map: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for m in 0..15u32 {
            let d = NaiveDate::from_ymd_opt(2024 + (m / 12) as i32, (m % 12) + 1, 1).unwrap();
            map.insert(d, m as i64);
        }
        let months = last_months_ascending(map);
        assert_eq!(months.len(), 12);
        assert!(months.windows(2).all(|w| w[0].0 < w[1].0));
        // Oldest three were dropped.
        assert_eq!(months[0].1, 3);
    }

    #[test]
    fn month_keys_and_labels() {
        let d = NaiveDate::from_ymd_opt(2025, 2, 17).unwrap();
        assert_eq!(month_floor(d), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(month_key(d), "2025-02");
        assert_eq!(month_label(d), "Feb 2025");
    }
}
