//! Demo data seed script
//!
//! Seeds a demo congregation with enough data to exercise the dashboard
//! and analytics endpoints:
//! - 1 service: Downtown Assembly
//! - 4 users: 1 admin, 1 pastor, 1 helper, 1 campaign manager
//! - 1 campaign per category
//! - 12 months of State-of-the-Flock and Soul Winning submissions
//! - assignments granting the manager the Soul Winning campaign
//!
//! Usage:
//!   DATABASE_URL=... SEED_PASSWORD=Demo2024! ./seed-demo
//!
//! Environment variables:
//!   DATABASE_URL   — PostgreSQL connection string (required)
//!   SEED_PASSWORD  — Password for all demo accounts (default: Demo2024!)

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use std::env;

use ssmg_api::db;
use ssmg_api::models::catalog::{CampaignKind, CATALOG};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL required")?;
    let password = env::var("SEED_PASSWORD").unwrap_or_else(|_| "Demo2024!".to_string());

    println!("=== Seed Demo Data ===");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    db::run_migrations(&pool).await?;

    let password_hash = bcrypt::hash(&password, 12)?;

    // 1. Service
    let service_id: i64 = sqlx::query_scalar(
        "INSERT INTO services (name, location)
         VALUES ('Downtown Assembly', 'Downtown')
         ON CONFLICT (name) DO UPDATE SET updated_at = NOW()
         RETURNING id",
    )
    .fetch_one(&pool)
    .await?;
    println!("Service: Downtown Assembly ({service_id})");

    // 2. Users
    let mut user_ids = Vec::new();
    for (username, email, first, last, role, svc) in [
        ("admin", "admin@example.org", "Ama", "Mensah", "ADMIN", Some(service_id)),
        ("pastor", "pastor@example.org", "Kofi", "Boateng", "PASTOR", Some(service_id)),
        ("helper", "helper@example.org", "Efua", "Owusu", "HELPER", Some(service_id)),
        ("manager", "manager@example.org", "Yaw", "Asante", "CAMPAIGN_MANAGER", None),
    ] {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, password_hash, first_name, last_name, role,
                                service_id, password_changed)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
             ON CONFLICT (username) DO UPDATE SET updated_at = NOW()
             RETURNING id",
        )
        .bind(username)
        .bind(email)
        .bind(&password_hash)
        .bind(first)
        .bind(last)
        .bind(role)
        .bind(svc)
        .fetch_one(&pool)
        .await?;
        println!("User: {username} ({role}) id={id}");
        user_ids.push(id);
    }
    let pastor_id = user_ids[1];
    let manager_id = user_ids[3];

    // 3. One campaign per category
    let mut soul_winning_campaign = 0i64;
    let mut sof_campaign = 0i64;
    for entry in CATALOG {
        let name = format!("{} 2025", entry.display_name);
        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {} (name, description, status)
             VALUES ($1, $2, 'ACTIVE')
             ON CONFLICT (name) DO UPDATE SET updated_at = NOW()
             RETURNING id",
            entry.campaign_table
        ))
        .bind(&name)
        .bind(format!("{} reporting for 2025", entry.display_name))
        .fetch_one(&pool)
        .await?;
        match entry.kind {
            CampaignKind::SoulWinning => soul_winning_campaign = id,
            CampaignKind::StateOfTheFlock => sof_campaign = id,
            _ => {}
        }
    }
    println!("Campaigns created for all {} categories", CATALOG.len());

    // 4. Twelve months of submissions from the pastor
    let today = Utc::now().date_naive();
    for back in 0..12i32 {
        let months = today.year() * 12 + today.month0() as i32 - back;
        let period = NaiveDate::from_ymd_opt(months.div_euclid(12), months.rem_euclid(12) as u32 + 1, 1)
            .context("valid period")?;

        sqlx::query(
            "INSERT INTO submission_sof (campaign_id, submitted_by, service_id, submission_period,
                                         date, total_membership, lost, stable, unstable)
             VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8)",
        )
        .bind(sof_campaign)
        .bind(pastor_id)
        .bind(service_id)
        .bind(period)
        .bind(120 + (11 - back) * 3)
        .bind(2 + back % 3)
        .bind(90 + (11 - back) * 2)
        .bind(20 + back % 5)
        .execute(&pool)
        .await?;

        sqlx::query(
            "INSERT INTO submission_swc (campaign_id, submitted_by, service_id, submission_period,
                                         date, no_of_crusades, no_of_souls_won,
                                         no_of_massive_organised_outreaches)
             VALUES ($1, $2, $3, $4, $4, $5, $6, $7)",
        )
        .bind(soul_winning_campaign)
        .bind(pastor_id)
        .bind(service_id)
        .bind(period)
        .bind(1 + back % 2)
        .bind(15 + (11 - back) * 2)
        .bind(back % 4)
        .execute(&pool)
        .await?;
    }
    println!("Seeded 12 months of submissions for the pastor");

    // 5. Manager assignment: Soul Winning only
    sqlx::query(
        "INSERT INTO campaign_manager_assignments (user_id, campaign_kind, campaign_id)
         VALUES ($1, $2, $3)
         ON CONFLICT (user_id, campaign_kind, campaign_id) DO NOTHING",
    )
    .bind(manager_id)
    .bind(CampaignKind::SoulWinning.slug())
    .bind(soul_winning_campaign)
    .execute(&pool)
    .await?;
    println!("Manager assigned to Soul Winning campaign {soul_winning_campaign}");

    // Recompute the derived membership count from the seeded rows.
    sqlx::query(
        "UPDATE services SET total_members = (
             SELECT total_membership FROM submission_sof
             WHERE service_id = services.id
             ORDER BY submission_period DESC NULLS LAST, created_at DESC
             LIMIT 1
         )
         WHERE id = $1",
    )
    .bind(service_id)
    .execute(&pool)
    .await?;

    println!("Done. All accounts use the seed password.");
    Ok(())
}
