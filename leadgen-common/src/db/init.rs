//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table
//! idempotently. Safe to run on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the database file, creating it and its parent directory if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets results readers run alongside the generation workers' inserts
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes if they don't exist
///
/// Foreign keys are enforced per connection by sqlx's SQLite defaults.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_leads_table(pool).await?;
    create_generated_scripts_table(pool).await?;
    create_user_profiles_table(pool).await?;
    create_generation_runs_table(pool).await?;

    info!("Database tables initialized (leads, generated_scripts, user_profiles, generation_runs)");
    Ok(())
}

async fn create_leads_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            short_hash TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT,
            company_name TEXT NOT NULL,
            website_url TEXT,
            email TEXT NOT NULL,
            business_type TEXT NOT NULL,
            business_description TEXT NOT NULL,
            marketing_location TEXT,
            city TEXT NOT NULL,
            country TEXT,
            crm_contact_id TEXT,
            user_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_user_id ON leads(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_generated_scripts_table(pool: &SqlitePool) -> Result<()> {
    // UNIQUE(lead_id, order_index): one row per position per lead
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generated_scripts (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL REFERENCES leads(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            script_body TEXT NOT NULL,
            order_index INTEGER NOT NULL CHECK (order_index >= 1),
            created_at TEXT NOT NULL,
            UNIQUE (lead_id, order_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_user_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_profiles (
            id TEXT PRIMARY KEY,
            email TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_generation_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS generation_runs (
            lead_id TEXT PRIMARY KEY REFERENCES leads(id) ON DELETE CASCADE,
            state TEXT NOT NULL,
            target_count INTEGER NOT NULL,
            titles_found INTEGER NOT NULL DEFAULT 0,
            scripts_saved INTEGER NOT NULL DEFAULT 0,
            placeholders INTEGER NOT NULL DEFAULT 0,
            error TEXT,
            queued_at TEXT NOT NULL,
            started_at TEXT,
            finished_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
