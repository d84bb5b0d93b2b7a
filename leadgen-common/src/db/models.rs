//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body stored for a title whose script could not be generated
pub const PLACEHOLDER_SCRIPT_BODY: &str = "Script generation failed. Please contact support.";

/// A form submission representing a prospective customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub short_hash: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub company_name: String,
    pub website_url: Option<String>,
    pub email: String,
    pub business_type: String,
    pub business_description: String,
    pub marketing_location: Option<String>,
    pub city: String,
    pub country: Option<String>,
    pub crm_contact_id: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sanitized intake fields for a lead that has not been stored yet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewLead {
    pub first_name: String,
    pub last_name: Option<String>,
    pub company_name: String,
    pub website_url: Option<String>,
    pub email: String,
    pub business_type: String,
    pub business_description: String,
    pub marketing_location: Option<String>,
    pub city: String,
    pub country: Option<String>,
    pub user_id: Option<String>,
}

/// Public projection of a lead returned by the results endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub id: Uuid,
    pub first_name: String,
    pub company_name: String,
}

impl From<&Lead> for LeadSummary {
    fn from(lead: &Lead) -> Self {
        Self {
            id: lead.id,
            first_name: lead.first_name.clone(),
            company_name: lead.company_name.clone(),
        }
    }
}

/// One generated video script, position `order_index` within its lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub title: String,
    pub script_body: String,
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

impl GeneratedScript {
    pub fn is_placeholder(&self) -> bool {
        self.script_body == PLACEHOLDER_SCRIPT_BODY
    }
}

/// Auth-provider user with the admin flag consumed by the admin views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a lead's generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Queued => "queued",
            GenerationState::Running => "running",
            GenerationState::Completed => "completed",
            GenerationState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(GenerationState::Queued),
            "running" => Some(GenerationState::Running),
            "completed" => Some(GenerationState::Completed),
            "failed" => Some(GenerationState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Completed | GenerationState::Failed)
    }
}

/// Persisted status of the generation job for one lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRun {
    pub lead_id: Uuid,
    pub state: GenerationState,
    pub target_count: i64,
    pub titles_found: i64,
    pub scripts_saved: i64,
    pub placeholders: i64,
    pub error: Option<String>,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Final counters written when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub titles_found: i64,
    pub scripts_saved: i64,
    pub placeholders: i64,
}
