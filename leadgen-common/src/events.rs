//! Event types and EventBus
//!
//! Replaces the database change feed: every script insertion and every
//! generation state change is published here, and SSE readers subscribe.
//! Delivery is at-least-once per subscriber as long as it keeps up with the
//! channel; lagging readers fall back to re-reading the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::GeneratedScript;

/// Lead lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LeadEvent {
    /// Intake stored a new lead
    LeadCreated {
        lead_id: Uuid,
        company_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A worker picked up the generation job
    GenerationStarted {
        lead_id: Uuid,
        target_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// One script row was persisted (real body or placeholder)
    ScriptSaved {
        lead_id: Uuid,
        script: GeneratedScript,
        placeholder: bool,
        timestamp: DateTime<Utc>,
    },

    /// Every parsed title has a row
    GenerationCompleted {
        lead_id: Uuid,
        scripts_saved: usize,
        placeholders: usize,
        timestamp: DateTime<Utc>,
    },

    /// The titles step failed; no scripts were produced
    GenerationFailed {
        lead_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The lead was forwarded to the CRM
    CrmSynced {
        lead_id: Uuid,
        contact_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl LeadEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LeadEvent::LeadCreated { .. } => "LeadCreated",
            LeadEvent::GenerationStarted { .. } => "GenerationStarted",
            LeadEvent::ScriptSaved { .. } => "ScriptSaved",
            LeadEvent::GenerationCompleted { .. } => "GenerationCompleted",
            LeadEvent::GenerationFailed { .. } => "GenerationFailed",
            LeadEvent::CrmSynced { .. } => "CrmSynced",
        }
    }

    pub fn lead_id(&self) -> Uuid {
        match self {
            LeadEvent::LeadCreated { lead_id, .. }
            | LeadEvent::GenerationStarted { lead_id, .. }
            | LeadEvent::ScriptSaved { lead_id, .. }
            | LeadEvent::GenerationCompleted { lead_id, .. }
            | LeadEvent::GenerationFailed { lead_id, .. }
            | LeadEvent::CrmSynced { lead_id, .. } => *lead_id,
        }
    }

    /// True for the events that end a generation run
    pub fn is_generation_terminal(&self) -> bool {
        matches!(
            self,
            LeadEvent::GenerationCompleted { .. } | LeadEvent::GenerationFailed { .. }
        )
    }
}

/// Broadcast bus shared by the HTTP handlers and the background workers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LeadEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus; `capacity` events are buffered per subscriber
    /// before the oldest are dropped
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LeadEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` when nobody is subscribed
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: LeadEvent) -> Result<usize, broadcast::error::SendError<LeadEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: LeadEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            tracing::trace!(event_type, "No subscribers for event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
