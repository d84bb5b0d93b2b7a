//! Generation run bookkeeping
//!
//! One row per lead. The row is created `queued` at intake, moves to
//! `running` when a worker picks the job up and ends `completed` or `failed`.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{
    format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid, GenerationRun,
    GenerationState, RunOutcome,
};
use crate::{Error, Result};

/// Error recorded on runs failed by [`fail_interrupted_runs`]
pub const INTERRUPTED_RUN_ERROR: &str = "Interrupted by restart";

/// Record (or reset) a queued run for a lead
pub async fn queue_run(pool: &SqlitePool, lead_id: Uuid, target_count: i64) -> Result<()> {
    let now = format_timestamp(&chrono::Utc::now());
    sqlx::query(
        r#"
        INSERT INTO generation_runs (lead_id, state, target_count, queued_at)
        VALUES (?, 'queued', ?, ?)
        ON CONFLICT(lead_id) DO UPDATE SET
            state = 'queued',
            target_count = excluded.target_count,
            titles_found = 0,
            scripts_saved = 0,
            placeholders = 0,
            error = NULL,
            queued_at = excluded.queued_at,
            started_at = NULL,
            finished_at = NULL
        "#,
    )
    .bind(lead_id.to_string())
    .bind(target_count)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Move a failed run back to `queued`
///
/// Returns false when the run is missing or not in the `failed` state, so two
/// concurrent regenerate requests cannot both enqueue the lead.
pub async fn requeue_failed_run(pool: &SqlitePool, lead_id: Uuid) -> Result<bool> {
    let now = format_timestamp(&chrono::Utc::now());
    let result = sqlx::query(
        r#"
        UPDATE generation_runs
        SET state = 'queued', error = NULL, titles_found = 0, scripts_saved = 0,
            placeholders = 0, queued_at = ?, started_at = NULL, finished_at = NULL
        WHERE lead_id = ? AND state = 'failed'
        "#,
    )
    .bind(&now)
    .bind(lead_id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fail every run left `queued` or `running` by a previous process
///
/// The job queue is in memory, so such runs will never finish on their own.
/// Returns the number of runs marked failed.
pub async fn fail_interrupted_runs(pool: &SqlitePool) -> Result<u64> {
    let now = format_timestamp(&chrono::Utc::now());
    let result = sqlx::query(
        r#"
        UPDATE generation_runs
        SET state = 'failed', error = ?, finished_at = ?
        WHERE state IN ('queued', 'running')
        "#,
    )
    .bind(INTERRUPTED_RUN_ERROR)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_running(pool: &SqlitePool, lead_id: Uuid) -> Result<()> {
    let now = format_timestamp(&chrono::Utc::now());
    sqlx::query("UPDATE generation_runs SET state = 'running', started_at = ? WHERE lead_id = ?")
        .bind(&now)
        .bind(lead_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Write the terminal state and counters
pub async fn finish_run(
    pool: &SqlitePool,
    lead_id: Uuid,
    state: GenerationState,
    outcome: RunOutcome,
    error: Option<&str>,
) -> Result<()> {
    if !state.is_terminal() {
        return Err(Error::InvalidInput(format!(
            "finish_run requires a terminal state, got {}",
            state.as_str()
        )));
    }

    let now = format_timestamp(&chrono::Utc::now());
    sqlx::query(
        r#"
        UPDATE generation_runs
        SET state = ?, titles_found = ?, scripts_saved = ?, placeholders = ?,
            error = ?, finished_at = ?
        WHERE lead_id = ?
        "#,
    )
    .bind(state.as_str())
    .bind(outcome.titles_found)
    .bind(outcome.scripts_saved)
    .bind(outcome.placeholders)
    .bind(error)
    .bind(&now)
    .bind(lead_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_run(pool: &SqlitePool, lead_id: Uuid) -> Result<Option<GenerationRun>> {
    let row = sqlx::query(
        r#"
        SELECT lead_id, state, target_count, titles_found, scripts_saved, placeholders,
               error, queued_at, started_at, finished_at
        FROM generation_runs
        WHERE lead_id = ?
        "#,
    )
    .bind(lead_id.to_string())
    .fetch_optional(pool)
    .await?;
    row.map(|r| run_from_row(&r)).transpose()
}

fn run_from_row(row: &SqliteRow) -> Result<GenerationRun> {
    let lead_id: String = row.try_get("lead_id")?;
    let state: String = row.try_get("state")?;
    let queued_at: String = row.try_get("queued_at")?;

    Ok(GenerationRun {
        lead_id: parse_uuid(&lead_id, "generation_runs.lead_id")?,
        state: GenerationState::parse(&state)
            .ok_or_else(|| Error::Internal(format!("Unknown generation state: {}", state)))?,
        target_count: row.try_get("target_count")?,
        titles_found: row.try_get("titles_found")?,
        scripts_saved: row.try_get("scripts_saved")?,
        placeholders: row.try_get("placeholders")?,
        error: row.try_get("error")?,
        queued_at: parse_timestamp(&queued_at, "generation_runs.queued_at")?,
        started_at: parse_optional_timestamp(row.try_get("started_at")?, "generation_runs.started_at")?,
        finished_at: parse_optional_timestamp(row.try_get("finished_at")?, "generation_runs.finished_at")?,
    })
}
