//! User profile queries for the admin views

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{format_timestamp, parse_timestamp, UserProfile};
use crate::Result;

pub async fn find_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<UserProfile>> {
    let row = sqlx::query(
        "SELECT id, email, is_admin, created_at, updated_at FROM user_profiles WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    row.map(|r| profile_from_row(&r)).transpose()
}

/// All profiles, newest first
pub async fn list_profiles(pool: &SqlitePool) -> Result<Vec<UserProfile>> {
    let rows = sqlx::query(
        "SELECT id, email, is_admin, created_at, updated_at FROM user_profiles ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(profile_from_row).collect()
}

/// True only for an existing profile with the admin flag set
pub async fn is_user_admin(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let flag: Option<i64> = sqlx::query_scalar("SELECT is_admin FROM user_profiles WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(flag.unwrap_or(0) != 0)
}

/// Promote or demote a user; returns the updated profile or None if unknown
pub async fn set_admin_flag(pool: &SqlitePool, user_id: &str, is_admin: bool) -> Result<Option<UserProfile>> {
    let now = format_timestamp(&chrono::Utc::now());
    let result = sqlx::query("UPDATE user_profiles SET is_admin = ?, updated_at = ? WHERE id = ?")
        .bind(is_admin as i64)
        .bind(&now)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find_profile(pool, user_id).await
}

/// Create the profile if missing, then apply the admin flag and email
pub async fn upsert_profile(
    pool: &SqlitePool,
    user_id: &str,
    email: Option<&str>,
    is_admin: bool,
) -> Result<UserProfile> {
    let now = format_timestamp(&chrono::Utc::now());
    sqlx::query(
        r#"
        INSERT INTO user_profiles (id, email, is_admin, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            email = COALESCE(excluded.email, user_profiles.email),
            is_admin = excluded.is_admin,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(is_admin as i64)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    find_profile(pool, user_id)
        .await?
        .ok_or_else(|| crate::Error::Internal(format!("Profile vanished after upsert: {}", user_id)))
}

fn profile_from_row(row: &SqliteRow) -> Result<UserProfile> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let is_admin: i64 = row.try_get("is_admin")?;

    Ok(UserProfile {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        is_admin: is_admin != 0,
        created_at: parse_timestamp(&created_at, "user_profiles.created_at")?,
        updated_at: parse_timestamp(&updated_at, "user_profiles.updated_at")?,
    })
}
