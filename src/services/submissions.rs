use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use crate::models::{
    auth::AuthenticatedUser,
    campaign::{SubmissionFile, SubmissionPayload},
    catalog::{coerce_id, CampaignKind, CatalogEntry, FieldKind, FieldSpec},
    pagination::PageQuery,
    user::User,
};
use crate::services::{
    assignments::AssignmentService, campaigns::CampaignService, files::FileStore, flock,
    ServiceError,
};

/// A category field value coerced to the column type it binds into.
#[derive(Debug, Clone)]
enum BoundValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Bool(Option<bool>),
    Date(Option<NaiveDate>),
}

fn coerce_field(spec: &FieldSpec, value: &Value) -> Result<BoundValue, ServiceError> {
    let invalid = || ServiceError::validation(spec.name, format!("Invalid value for {}.", spec.name));

    if value.is_null() {
        return Ok(match spec.kind {
            FieldKind::Int => BoundValue::Int(None),
            FieldKind::Float => BoundValue::Float(None),
            FieldKind::Text => BoundValue::Text(None),
            FieldKind::Bool => BoundValue::Bool(None),
            FieldKind::Date => BoundValue::Date(None),
        });
    }

    match spec.kind {
        FieldKind::Int => match value {
            Value::Number(n) => n.as_i64().map(|v| BoundValue::Int(Some(v))).ok_or_else(invalid),
            Value::String(s) => s
                .trim()
                .parse()
                .map(|v| BoundValue::Int(Some(v)))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        FieldKind::Float => match value {
            Value::Number(n) => n.as_f64().map(|v| BoundValue::Float(Some(v))).ok_or_else(invalid),
            Value::String(s) => s
                .trim()
                .parse()
                .map(|v| BoundValue::Float(Some(v)))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
        FieldKind::Text => match value {
            Value::String(s) => Ok(BoundValue::Text(Some(s.clone()))),
            _ => Err(invalid()),
        },
        FieldKind::Bool => match value {
            Value::Bool(b) => Ok(BoundValue::Bool(Some(*b))),
            Value::String(s) => match s.as_str() {
                "true" | "True" | "1" => Ok(BoundValue::Bool(Some(true))),
                "false" | "False" | "0" => Ok(BoundValue::Bool(Some(false))),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        },
        FieldKind::Date => match value {
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| BoundValue::Date(Some(d)))
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        },
    }
}

/// Keys a client may echo back from a submission response; silently
/// ignored on writes rather than rejected.
const READ_ONLY_KEYS: &[&str] = &[
    "id",
    "campaign_name",
    "submitted_by",
    "submitted_by_name",
    "service_name",
    "pictures",
    "created_at",
    "updated_at",
];

/// Validate the flattened metric fields of a payload against the catalog
/// entry. Unknown keys are rejected; omitted ones are simply absent.
fn parse_fields(
    entry: &'static CatalogEntry,
    fields: &Map<String, Value>,
) -> Result<Vec<(&'static FieldSpec, BoundValue)>, ServiceError> {
    let mut parsed = Vec::new();
    for (key, value) in fields {
        if READ_ONLY_KEYS.contains(&key.as_str()) {
            continue;
        }
        let spec = entry
            .fields
            .iter()
            .find(|f| f.name == key.as_str())
            .ok_or_else(|| {
                ServiceError::validation("fields", format!("Unknown field: {key}."))
            })?;
        parsed.push((spec, coerce_field(spec, value)?));
    }
    Ok(parsed)
}

pub(crate) fn field_to_json(row: &PgRow, spec: &FieldSpec) -> Value {
    match spec.kind {
        FieldKind::Int => row
            .try_get::<Option<i32>, _>(spec.name)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        FieldKind::Float => row
            .try_get::<Option<f64>, _>(spec.name)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        FieldKind::Text => row
            .try_get::<Option<String>, _>(spec.name)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        FieldKind::Bool => row
            .try_get::<Option<bool>, _>(spec.name)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
        FieldKind::Date => row
            .try_get::<Option<NaiveDate>, _>(spec.name)
            .map(|v| json!(v))
            .unwrap_or(Value::Null),
    }
}

fn full_name(first: Option<String>, last: Option<String>) -> String {
    format!(
        "{} {}",
        first.as_deref().unwrap_or(""),
        last.as_deref().unwrap_or("")
    )
    .trim()
    .to_string()
}

fn row_to_json(entry: &'static CatalogEntry, row: &PgRow, pictures: Option<Vec<Value>>) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), json!(row.get::<i64, _>("id")));
    out.insert("campaign".into(), json!(row.get::<i64, _>("campaign_id")));
    out.insert(
        "campaign_name".into(),
        json!(row.get::<Option<String>, _>("campaign_name")),
    );
    out.insert("submitted_by".into(), json!(row.get::<i64, _>("submitted_by")));
    out.insert(
        "submitted_by_name".into(),
        json!(full_name(
            row.get::<Option<String>, _>("first_name"),
            row.get::<Option<String>, _>("last_name"),
        )),
    );
    out.insert("service".into(), json!(row.get::<Option<i64>, _>("service_id")));
    out.insert(
        "service_name".into(),
        json!(row.get::<Option<String>, _>("service_name")),
    );
    out.insert(
        "submission_period".into(),
        json!(row.get::<Option<NaiveDate>, _>("submission_period")),
    );
    out.insert("date".into(), json!(row.get::<Option<NaiveDate>, _>("date")));
    for spec in entry.fields {
        out.insert(spec.name.to_string(), field_to_json(row, spec));
    }
    if let Some(pics) = pictures {
        out.insert("pictures".into(), Value::Array(pics));
    }
    out.insert(
        "created_at".into(),
        json!(row.get::<chrono::DateTime<chrono::Utc>, _>("created_at")),
    );
    out.insert(
        "updated_at".into(),
        json!(row.get::<chrono::DateTime<chrono::Utc>, _>("updated_at")),
    );
    Value::Object(out)
}

fn select_clause(entry: &'static CatalogEntry) -> String {
    let mut cols = String::from(
        "s.id, s.campaign_id, c.name AS campaign_name, s.submitted_by, u.first_name, u.last_name, \
         s.service_id, sv.name AS service_name, s.submission_period, s.date, s.created_at, s.updated_at",
    );
    for spec in entry.fields {
        cols.push_str(", s.");
        cols.push_str(spec.name);
    }
    format!(
        "SELECT {cols} FROM {sub} s
         JOIN {camp} c ON c.id = s.campaign_id
         JOIN users u ON u.id = s.submitted_by
         LEFT JOIN services sv ON sv.id = s.service_id",
        sub = entry.submission_table,
        camp = entry.campaign_table,
    )
}

/// Manager visibility scope: None = unrestricted, Some(ids) = only these
/// campaign ids (empty = nothing, fail-closed).
async fn scope_for(
    pool: &PgPool,
    entry: &'static CatalogEntry,
    user: &AuthenticatedUser,
) -> anyhow::Result<Option<Vec<i64>>> {
    if user.role.is_campaign_manager() {
        Ok(Some(
            AssignmentService::assigned_ids(pool, user.user_id, entry.kind).await?,
        ))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Default)]
pub struct SubmissionFilters {
    pub campaign: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

enum Bind {
    Ids(Vec<i64>),
    Id(i64),
    Date(NaiveDate),
}

pub struct SubmissionService;

impl SubmissionService {
    pub async fn list(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user: &AuthenticatedUser,
        filters: &SubmissionFilters,
        page: &PageQuery,
    ) -> Result<Value, ServiceError> {
        let scope = scope_for(pool, entry, user).await?;
        if matches!(&scope, Some(ids) if ids.is_empty()) {
            return Ok(page.envelope(0, json!([])));
        }

        let mut conds = String::new();
        let mut binds: Vec<Bind> = Vec::new();
        let mut n = 0;

        if let Some(ids) = scope {
            n += 1;
            conds.push_str(&format!(" AND s.campaign_id = ANY(${n})"));
            binds.push(Bind::Ids(ids));
        }
        if let Some(campaign) = filters.campaign {
            n += 1;
            conds.push_str(&format!(" AND s.campaign_id = ${n}"));
            binds.push(Bind::Id(campaign));
        }
        if let Some(start) = filters.start_date {
            n += 1;
            conds.push_str(&format!(" AND s.submission_period >= ${n}"));
            binds.push(Bind::Date(start));
        }
        if let Some(end) = filters.end_date {
            n += 1;
            conds.push_str(&format!(" AND s.submission_period <= ${n}"));
            binds.push(Bind::Date(end));
        }

        let count_sql = format!(
            "SELECT COUNT(*) FROM {} s WHERE 1=1{conds}",
            entry.submission_table
        );
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for b in &binds {
            count_q = match b {
                Bind::Ids(v) => count_q.bind(v.clone()),
                Bind::Id(v) => count_q.bind(*v),
                Bind::Date(d) => count_q.bind(*d),
            };
        }
        let count = count_q.fetch_one(pool).await?;

        let rows_sql = format!(
            "{} WHERE 1=1{conds}
             ORDER BY s.submission_period DESC NULLS LAST, s.created_at DESC
             LIMIT {} OFFSET {}",
            select_clause(entry),
            page.limit(),
            page.offset(),
        );
        let mut rows_q = sqlx::query(&rows_sql);
        for b in &binds {
            rows_q = match b {
                Bind::Ids(v) => rows_q.bind(v.clone()),
                Bind::Id(v) => rows_q.bind(*v),
                Bind::Date(d) => rows_q.bind(*d),
            };
        }
        let rows = rows_q.fetch_all(pool).await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.get::<i64, _>("id")).collect();
        let mut pictures = Self::pictures_for(pool, entry, &ids).await?;

        let results: Vec<Value> = rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let pics = entry.file_table.map(|_| pictures.remove(&id).unwrap_or_default());
                row_to_json(entry, row, pics)
            })
            .collect();

        Ok(page.envelope(count, json!(results)))
    }

    async fn pictures_for(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Value>>, sqlx::Error> {
        let mut map: HashMap<i64, Vec<Value>> = HashMap::new();
        let Some(file_table) = entry.file_table else {
            return Ok(map);
        };
        if ids.is_empty() {
            return Ok(map);
        }
        let files = sqlx::query_as::<_, SubmissionFile>(&format!(
            "SELECT * FROM {file_table} WHERE submission_id = ANY($1) ORDER BY uploaded_at"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await?;
        for f in files {
            map.entry(f.submission_id).or_default().push(json!({
                "id": f.id,
                "file": f.file,
                "uploaded_at": f.uploaded_at,
            }));
        }
        Ok(map)
    }

    pub async fn get(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user: &AuthenticatedUser,
        id: i64,
    ) -> Result<Value, ServiceError> {
        let row = sqlx::query(&format!("{} WHERE s.id = $1", select_clause(entry)))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if let Some(ids) = scope_for(pool, entry, user).await? {
            let campaign_id: i64 = row.get("campaign_id");
            if !ids.contains(&campaign_id) {
                return Err(ServiceError::NotFound);
            }
        }

        let pictures = if entry.file_table.is_some() {
            let mut map = Self::pictures_for(pool, entry, &[id]).await?;
            Some(map.remove(&id).unwrap_or_default())
        } else {
            None
        };
        Ok(row_to_json(entry, &row, pictures))
    }

    /// Write path. Order of checks: campaign id present, campaign exists,
    /// manager assignment, service resolution. Managers submit on behalf of
    /// an explicit service; everyone else always gets their own.
    pub async fn create(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user: &AuthenticatedUser,
        payload: &SubmissionPayload,
        campaign_param: Option<&str>,
    ) -> Result<Value, ServiceError> {
        let campaign_value = payload
            .campaign
            .clone()
            .or_else(|| campaign_param.map(|s| Value::String(s.to_string())));
        let campaign_value = campaign_value
            .filter(|v| !v.is_null())
            .ok_or_else(|| ServiceError::validation("campaign", "This field is required."))?;
        let campaign_id = coerce_id(&campaign_value)
            .ok_or_else(|| ServiceError::validation("campaign", "Invalid campaign id."))?;

        if !CampaignService::exists(pool, entry, campaign_id).await? {
            return Err(ServiceError::validation("campaign", "Invalid campaign id."));
        }

        let submitter = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let service_id = if user.role.is_campaign_manager() {
            if !AssignmentService::is_assigned(pool, user.user_id, entry.kind, campaign_id).await? {
                return Err(ServiceError::validation(
                    "campaign",
                    "You are not assigned to this campaign.",
                ));
            }
            let service_value = payload
                .service
                .as_ref()
                .filter(|v| !v.is_null())
                .ok_or_else(|| ServiceError::validation("service", "This field is required."))?;
            let sid = coerce_id(service_value)
                .ok_or_else(|| ServiceError::validation("service", "Service does not exist."))?;
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM services WHERE id = $1)")
                    .bind(sid)
                    .fetch_one(pool)
                    .await?;
            if !exists {
                return Err(ServiceError::validation("service", "Service does not exist."));
            }
            Some(sid)
        } else {
            // Never trust a client-supplied service for non-managers.
            submitter.service_id
        };

        let fields = parse_fields(entry, &payload.fields)?;

        let mut columns = String::from("campaign_id, submitted_by, service_id, submission_period, date");
        let mut placeholders = String::from("$1, $2, $3, $4, $5");
        for (i, (spec, _)) in fields.iter().enumerate() {
            columns.push_str(", ");
            columns.push_str(spec.name);
            placeholders.push_str(&format!(", ${}", i + 6));
        }
        let sql = format!(
            "INSERT INTO {} ({columns}) VALUES ({placeholders}) RETURNING id",
            entry.submission_table
        );

        let mut tx = pool.begin().await?;

        let mut q = sqlx::query_scalar::<_, i64>(&sql)
            .bind(campaign_id)
            .bind(user.user_id)
            .bind(service_id)
            .bind(payload.submission_period)
            .bind(payload.date);
        for (_, value) in &fields {
            q = bind_value(q, value);
        }
        let id = q.fetch_one(&mut *tx).await?;

        if entry.kind == CampaignKind::StateOfTheFlock {
            if let Some(sid) = service_id {
                flock::recalculate_total_members(&mut tx, sid).await?;
            }
        }

        tx.commit().await?;

        Self::get(pool, entry, user, id).await
    }

    /// Partial update of the writable fields. Campaign, submitter and
    /// service are immutable once written.
    pub async fn update(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user: &AuthenticatedUser,
        id: i64,
        payload: &SubmissionPayload,
    ) -> Result<Value, ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT campaign_id, service_id FROM {} WHERE id = $1",
            entry.submission_table
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        let campaign_id: i64 = row.get("campaign_id");
        let service_id: Option<i64> = row.get("service_id");

        if let Some(ids) = scope_for(pool, entry, user).await? {
            if !ids.contains(&campaign_id) {
                return Err(ServiceError::NotFound);
            }
        }

        let fields = parse_fields(entry, &payload.fields)?;

        let mut sets: Vec<String> = vec!["updated_at = NOW()".into()];
        let mut n = 1; // $1 = id
        if payload.submission_period.is_some() {
            n += 1;
            sets.push(format!("submission_period = ${n}"));
        }
        if payload.date.is_some() {
            n += 1;
            sets.push(format!("date = ${n}"));
        }
        for (spec, _) in &fields {
            n += 1;
            sets.push(format!("{} = ${n}", spec.name));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = $1",
            entry.submission_table,
            sets.join(", ")
        );

        let mut tx = pool.begin().await?;

        let mut q = sqlx::query(&sql).bind(id);
        if let Some(p) = payload.submission_period {
            q = q.bind(p);
        }
        if let Some(d) = payload.date {
            q = q.bind(d);
        }
        for (_, value) in &fields {
            q = bind_value_plain(q, value);
        }
        q.execute(&mut *tx).await?;

        if entry.kind == CampaignKind::StateOfTheFlock {
            if let Some(sid) = service_id {
                flock::recalculate_total_members(&mut tx, sid).await?;
            }
        }

        tx.commit().await?;

        Self::get(pool, entry, user, id).await
    }

    pub async fn delete(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user: &AuthenticatedUser,
        id: i64,
        media_dir: &str,
    ) -> Result<(), ServiceError> {
        let row = sqlx::query(&format!(
            "SELECT campaign_id, service_id FROM {} WHERE id = $1",
            entry.submission_table
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        let campaign_id: i64 = row.get("campaign_id");
        let service_id: Option<i64> = row.get("service_id");

        if let Some(ids) = scope_for(pool, entry, user).await? {
            if !ids.contains(&campaign_id) {
                return Err(ServiceError::NotFound);
            }
        }

        // File rows cascade with the submission; collect paths first for
        // disk cleanup after commit.
        let mut stored_files: Vec<String> = Vec::new();
        if let Some(file_table) = entry.file_table {
            stored_files = sqlx::query_scalar(&format!(
                "SELECT file FROM {file_table} WHERE submission_id = $1"
            ))
            .bind(id)
            .fetch_all(pool)
            .await?;
        }

        let mut tx = pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", entry.submission_table))
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if entry.kind == CampaignKind::StateOfTheFlock {
            if let Some(sid) = service_id {
                flock::recalculate_total_members(&mut tx, sid).await?;
            }
        }

        tx.commit().await?;

        for path in stored_files {
            FileStore::remove(media_dir, &path).await;
        }

        Ok(())
    }

    /// Attach uploaded pictures to an existing submission.
    pub async fn add_files(
        pool: &PgPool,
        entry: &'static CatalogEntry,
        user: &AuthenticatedUser,
        id: i64,
        uploads: Vec<(String, Vec<u8>)>,
        media_dir: &str,
    ) -> Result<Vec<Value>, ServiceError> {
        let file_table = entry.file_table.ok_or_else(|| {
            ServiceError::validation("picture_files", "This campaign type does not accept pictures.")
        })?;

        // Visibility check doubles as existence check.
        Self::get(pool, entry, user, id).await?;

        let mut out = Vec::with_capacity(uploads.len());
        for (name, data) in uploads {
            let stored = FileStore::save(media_dir, "campaign_submissions", &name, &data)
                .await
                .map_err(ServiceError::Other)?;
            let file: SubmissionFile = sqlx::query_as(&format!(
                "INSERT INTO {file_table} (submission_id, file) VALUES ($1, $2) RETURNING *"
            ))
            .bind(id)
            .bind(&stored)
            .fetch_one(pool)
            .await?;
            out.push(json!({
                "id": file.id,
                "file": file.file,
                "uploaded_at": file.uploaded_at,
            }));
        }
        Ok(out)
    }
}

type ScalarQuery<'q> =
    sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>;

fn bind_value<'q>(q: ScalarQuery<'q>, value: &'q BoundValue) -> ScalarQuery<'q> {
    match value {
        BoundValue::Int(v) => q.bind(*v),
        BoundValue::Float(v) => q.bind(*v),
        BoundValue::Text(v) => q.bind(v.clone()),
        BoundValue::Bool(v) => q.bind(*v),
        BoundValue::Date(v) => q.bind(*v),
    }
}

type PlainQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_value_plain<'q>(q: PlainQuery<'q>, value: &'q BoundValue) -> PlainQuery<'q> {
    match value {
        BoundValue::Int(v) => q.bind(*v),
        BoundValue::Float(v) => q.bind(*v),
        BoundValue::Text(v) => q.bind(v.clone()),
        BoundValue::Bool(v) => q.bind(*v),
        BoundValue::Date(v) => q.bind(*v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::entry_for_slug;

    #[test]
    fn unknown_fields_are_rejected() {
        let entry = entry_for_slug("soul-winning").unwrap();
        let mut fields = Map::new();
        fields.insert("no_of_souls_won".into(), json!(12));
        assert!(parse_fields(entry, &fields).is_ok());

        fields.insert("nonexistent".into(), json!(1));
        let err = parse_fields(entry, &fields).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "fields", .. }));
    }

    #[test]
    fn read_only_keys_are_ignored_on_write() {
        let entry = entry_for_slug("soul-winning").unwrap();
        let mut fields = Map::new();
        fields.insert("no_of_souls_won".into(), json!(3));
        fields.insert("submitted_by_name".into(), json!("Kofi Boateng"));
        fields.insert("created_at".into(), json!("2025-01-01T00:00:00Z"));

        let parsed = parse_fields(entry, &fields).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0.name, "no_of_souls_won");
    }

    #[test]
    fn numeric_strings_coerce_like_numbers() {
        let entry = entry_for_slug("soul-winning").unwrap();
        let spec = entry.fields.iter().find(|f| f.name == "no_of_souls_won").unwrap();

        let from_number = coerce_field(spec, &json!(12)).unwrap();
        let from_string = coerce_field(spec, &json!("12")).unwrap();
        assert!(matches!(from_number, BoundValue::Int(Some(12))));
        assert!(matches!(from_string, BoundValue::Int(Some(12))));
    }

    #[test]
    fn dates_and_bools_coerce() {
        let entry = entry_for_slug("equipment").unwrap();
        let date_spec = entry.fields.iter().find(|f| f.name == "purchase_date").unwrap();
        let bool_spec = entry.fields.iter().find(|f| f.name == "is_functional").unwrap();

        assert!(matches!(
            coerce_field(date_spec, &json!("2025-03-01")).unwrap(),
            BoundValue::Date(Some(_))
        ));
        assert!(coerce_field(date_spec, &json!("03/01/2025")).is_err());
        assert!(matches!(
            coerce_field(bool_spec, &json!("true")).unwrap(),
            BoundValue::Bool(Some(true))
        ));
        assert!(matches!(
            coerce_field(bool_spec, &json!(null)).unwrap(),
            BoundValue::Bool(None)
        ));
    }
}
