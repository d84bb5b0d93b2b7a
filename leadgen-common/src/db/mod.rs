//! Database schema, models and queries

pub mod init;
pub mod leads;
pub mod models;
pub mod profiles;
pub mod runs;
pub mod scripts;

pub use init::*;
pub use leads::*;
pub use models::*;
pub use profiles::*;
pub use runs::*;
pub use scripts::*;

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fixed-width RFC 3339 so TEXT columns sort chronologically
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a TEXT uuid column
pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid uuid in {}: {} ({})", column, value, e)))
}

/// Parse a TEXT RFC 3339 timestamp column
pub(crate) fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {} ({})", column, value, e)))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
    column: &str,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_timestamp(&s, column)).transpose()
}
