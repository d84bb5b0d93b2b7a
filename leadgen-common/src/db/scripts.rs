//! Generated script persistence
//!
//! Rows are append-only. `(lead_id, order_index)` is unique, so a second
//! insert for the same position fails with a constraint violation instead of
//! producing a duplicate.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid, GeneratedScript};
use crate::Result;

/// Insert one script row and return it as stored
pub async fn insert_script(
    pool: &SqlitePool,
    lead_id: Uuid,
    title: &str,
    script_body: &str,
    order_index: i64,
) -> Result<GeneratedScript> {
    let script = GeneratedScript {
        id: Uuid::new_v4(),
        lead_id,
        title: title.to_string(),
        script_body: script_body.to_string(),
        order_index,
        created_at: chrono::Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO generated_scripts (id, lead_id, title, script_body, order_index, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(script.id.to_string())
    .bind(script.lead_id.to_string())
    .bind(&script.title)
    .bind(&script.script_body)
    .bind(script.order_index)
    .bind(format_timestamp(&script.created_at))
    .execute(pool)
    .await?;

    Ok(script)
}

/// Scripts for one lead ordered by position
pub async fn list_scripts_for_lead(pool: &SqlitePool, lead_id: Uuid) -> Result<Vec<GeneratedScript>> {
    let rows = sqlx::query(
        r#"
        SELECT id, lead_id, title, script_body, order_index, created_at
        FROM generated_scripts
        WHERE lead_id = ?
        ORDER BY order_index
        "#,
    )
    .bind(lead_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(script_from_row).collect()
}

/// Scripts for every lead owned by a user, newest first
pub async fn list_scripts_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<GeneratedScript>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.lead_id, s.title, s.script_body, s.order_index, s.created_at
        FROM generated_scripts s
        JOIN leads l ON l.id = s.lead_id
        WHERE l.user_id = ?
        ORDER BY s.created_at DESC, s.order_index DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(script_from_row).collect()
}

pub async fn count_scripts_for_lead(pool: &SqlitePool, lead_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM generated_scripts WHERE lead_id = ?")
        .bind(lead_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn script_from_row(row: &SqliteRow) -> Result<GeneratedScript> {
    let id: String = row.try_get("id")?;
    let lead_id: String = row.try_get("lead_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(GeneratedScript {
        id: parse_uuid(&id, "generated_scripts.id")?,
        lead_id: parse_uuid(&lead_id, "generated_scripts.lead_id")?,
        title: row.try_get("title")?,
        script_body: row.try_get("script_body")?,
        order_index: row.try_get("order_index")?,
        created_at: parse_timestamp(&created_at, "generated_scripts.created_at")?,
    })
}
