//! CRM contact sync
//!
//! Best-effort forwarding of new leads to the CRM. Nothing here is allowed to
//! affect generation or the intake response: every error is logged and
//! swallowed by [`CrmSync::sync_lead`].

pub mod gohighlevel;

use async_trait::async_trait;
use chrono::Utc;
use leadgen_common::db::{self, Lead};
use leadgen_common::events::{EventBus, LeadEvent};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

pub use gohighlevel::GoHighLevelClient;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Client setup failed: {0}")]
    Setup(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomField {
    pub key: &'static str,
    pub field_value: String,
}

/// Body of a contact-creation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_name: String,
    pub city: String,
    pub source: String,
    pub location_id: String,
    pub custom_fields: Vec<CustomField>,
}

impl ContactPayload {
    pub fn for_lead(lead: &Lead, source: &str, location_id: &str) -> Self {
        Self {
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone().unwrap_or_default(),
            email: lead.email.clone(),
            company_name: lead.company_name.clone(),
            city: lead.city.clone(),
            source: source.to_string(),
            location_id: location_id.to_string(),
            custom_fields: vec![
                CustomField {
                    key: "business_type",
                    field_value: lead.business_type.clone(),
                },
                CustomField {
                    key: "business_description",
                    field_value: lead.business_description.clone(),
                },
            ],
        }
    }
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Create a contact and return its CRM id
    async fn create_contact(&self, payload: &ContactPayload) -> Result<String, CrmError>;

    async fn add_to_workflow(&self, contact_id: &str, workflow_id: &str) -> Result<(), CrmError>;
}

/// Where and how contacts are filed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmSettings {
    pub location_id: String,
    pub workflow_id: Option<String>,
    pub source: String,
}

/// Lead-level sync: create contact, store its id, enroll in the workflow
pub struct CrmSync {
    client: Arc<dyn CrmClient>,
    db: SqlitePool,
    event_bus: EventBus,
    settings: CrmSettings,
}

impl CrmSync {
    pub fn new(
        client: Arc<dyn CrmClient>,
        db: SqlitePool,
        event_bus: EventBus,
        settings: CrmSettings,
    ) -> Self {
        Self {
            client,
            db,
            event_bus,
            settings,
        }
    }

    /// Forward `lead` to the CRM; returns the contact id on success
    pub async fn sync_lead(&self, lead: &Lead) -> Option<String> {
        let payload =
            ContactPayload::for_lead(lead, &self.settings.source, &self.settings.location_id);

        let contact_id = match self.client.create_contact(&payload).await {
            Ok(id) => id,
            Err(e) => {
                error!(lead_id = %lead.id, error = %e, "CRM contact creation failed");
                return None;
            }
        };

        match db::set_crm_contact_id(&self.db, lead.id, &contact_id).await {
            Ok(true) => {}
            Ok(false) => warn!(lead_id = %lead.id, "Lead vanished before CRM id could be stored"),
            Err(e) => error!(lead_id = %lead.id, error = %e, "Failed to store CRM contact id"),
        }

        self.event_bus.emit_lossy(LeadEvent::CrmSynced {
            lead_id: lead.id,
            contact_id: contact_id.clone(),
            timestamp: Utc::now(),
        });

        if let Some(workflow_id) = &self.settings.workflow_id {
            match self.client.add_to_workflow(&contact_id, workflow_id).await {
                Ok(()) => info!(lead_id = %lead.id, contact_id = %contact_id, "Added contact to CRM workflow"),
                Err(e) => error!(lead_id = %lead.id, error = %e, "Failed to add contact to CRM workflow"),
            }
        }

        info!(lead_id = %lead.id, contact_id = %contact_id, "Lead synced to CRM");
        Some(contact_id)
    }
}
