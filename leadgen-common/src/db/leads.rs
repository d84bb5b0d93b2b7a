//! Lead persistence

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid, Lead, NewLead};
use crate::sanitize::{generate_short_hash, is_short_hash};
use crate::Result;

const LEAD_COLUMNS: &str = r#"
    id, short_hash, first_name, last_name, company_name, website_url, email,
    business_type, business_description, marketing_location, city, country,
    crm_contact_id, user_id, created_at
"#;

/// Insert a new lead with a fresh id and short hash
pub async fn insert_lead(pool: &SqlitePool, new_lead: &NewLead) -> Result<Lead> {
    let lead = Lead {
        id: Uuid::new_v4(),
        short_hash: generate_short_hash(),
        first_name: new_lead.first_name.clone(),
        last_name: new_lead.last_name.clone(),
        company_name: new_lead.company_name.clone(),
        website_url: new_lead.website_url.clone(),
        email: new_lead.email.clone(),
        business_type: new_lead.business_type.clone(),
        business_description: new_lead.business_description.clone(),
        marketing_location: new_lead.marketing_location.clone(),
        city: new_lead.city.clone(),
        country: new_lead.country.clone(),
        crm_contact_id: None,
        user_id: new_lead.user_id.clone(),
        created_at: chrono::Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO leads (
            id, short_hash, first_name, last_name, company_name, website_url, email,
            business_type, business_description, marketing_location, city, country,
            crm_contact_id, user_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(lead.id.to_string())
    .bind(&lead.short_hash)
    .bind(&lead.first_name)
    .bind(&lead.last_name)
    .bind(&lead.company_name)
    .bind(&lead.website_url)
    .bind(&lead.email)
    .bind(&lead.business_type)
    .bind(&lead.business_description)
    .bind(&lead.marketing_location)
    .bind(&lead.city)
    .bind(&lead.country)
    .bind(&lead.crm_contact_id)
    .bind(&lead.user_id)
    .bind(format_timestamp(&lead.created_at))
    .execute(pool)
    .await?;

    Ok(lead)
}

pub async fn find_lead_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Lead>> {
    let sql = format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(|r| lead_from_row(&r)).transpose()
}

pub async fn find_lead_by_short_hash(pool: &SqlitePool, short_hash: &str) -> Result<Option<Lead>> {
    let sql = format!("SELECT {} FROM leads WHERE short_hash = ?", LEAD_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(short_hash)
        .fetch_optional(pool)
        .await?;
    row.map(|r| lead_from_row(&r)).transpose()
}

/// Resolve a public identifier: either the lead UUID or its short hash
pub async fn find_lead_by_identifier(pool: &SqlitePool, identifier: &str) -> Result<Option<Lead>> {
    if is_short_hash(identifier) {
        return find_lead_by_short_hash(pool, identifier).await;
    }
    match Uuid::parse_str(identifier) {
        Ok(id) => find_lead_by_id(pool, id).await,
        Err(_) => Ok(None),
    }
}

/// All leads, newest first
pub async fn list_leads(pool: &SqlitePool) -> Result<Vec<Lead>> {
    let sql = format!("SELECT {} FROM leads ORDER BY created_at DESC", LEAD_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(lead_from_row).collect()
}

/// Leads owned by an auth-provider user, newest first
pub async fn list_leads_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Lead>> {
    let sql = format!(
        "SELECT {} FROM leads WHERE user_id = ? ORDER BY created_at DESC",
        LEAD_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
    rows.iter().map(lead_from_row).collect()
}

/// Attach the external CRM contact reference (the only post-intake mutation)
///
/// Returns false when the lead no longer exists.
pub async fn set_crm_contact_id(pool: &SqlitePool, lead_id: Uuid, contact_id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE leads SET crm_contact_id = ? WHERE id = ?")
        .bind(contact_id)
        .bind(lead_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_leads(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn lead_from_row(row: &SqliteRow) -> Result<Lead> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Lead {
        id: parse_uuid(&id, "leads.id")?,
        short_hash: row.try_get("short_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        company_name: row.try_get("company_name")?,
        website_url: row.try_get("website_url")?,
        email: row.try_get("email")?,
        business_type: row.try_get("business_type")?,
        business_description: row.try_get("business_description")?,
        marketing_location: row.try_get("marketing_location")?,
        city: row.try_get("city")?,
        country: row.try_get("country")?,
        crm_contact_id: row.try_get("crm_contact_id")?,
        user_id: row.try_get("user_id")?,
        created_at: parse_timestamp(&created_at, "leads.created_at")?,
    })
}
