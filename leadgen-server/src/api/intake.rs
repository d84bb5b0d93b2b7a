//! Lead intake
//!
//! POST /api/generate validates the form, stores the lead and hands it to the
//! background workers. The response never waits for generation.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    middleware,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use leadgen_common::db::{self, GenerationState, NewLead, RunOutcome};
use leadgen_common::events::LeadEvent;
use leadgen_common::sanitize::{validate_email, validate_input, MAX_EMAIL_LEN};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::auth::user_id_from_headers;
use super::json_body;
use crate::business_types::category_of;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::{rate_limit_middleware, FixedWindowLimiter};
use crate::AppState;

pub const MAX_FIRST_NAME: usize = 50;
pub const MAX_LAST_NAME: usize = 50;
pub const MAX_COMPANY_NAME: usize = 100;
pub const MAX_BUSINESS_TYPE: usize = 100;
pub const MAX_BUSINESS_DESCRIPTION: usize = 1000;
pub const MAX_MARKETING_LOCATION: usize = 100;
pub const MAX_CITY: usize = 50;
pub const MAX_COUNTRY: usize = 50;
pub const MAX_WEBSITE_URL: usize = 200;

const MISSING_FIELDS: &str = "All required fields must be provided and non-empty";
const INVALID_EMAIL: &str = "Invalid email format";

/// Sanitized intake form; empty string means "not provided"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeForm {
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub website_url: String,
    pub email: String,
    pub business_type: String,
    pub business_description: String,
    pub marketing_location: String,
    pub city: String,
    pub country: String,
}

impl IntakeForm {
    /// Sanitize every known field of an untrusted JSON body
    pub fn from_json(body: &Value) -> Self {
        let field = |name: &str, max_len: usize| validate_input(body.get(name), max_len);

        Self {
            first_name: field("firstName", MAX_FIRST_NAME),
            last_name: field("lastName", MAX_LAST_NAME),
            company_name: field("companyName", MAX_COMPANY_NAME),
            website_url: field("websiteUrl", MAX_WEBSITE_URL),
            email: field("email", MAX_EMAIL_LEN),
            business_type: field("businessType", MAX_BUSINESS_TYPE),
            business_description: field("businessDescription", MAX_BUSINESS_DESCRIPTION),
            marketing_location: field("marketingLocation", MAX_MARKETING_LOCATION),
            city: field("city", MAX_CITY),
            country: field("country", MAX_COUNTRY),
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        let required = [
            &self.first_name,
            &self.company_name,
            &self.email,
            &self.business_type,
            &self.business_description,
            &self.city,
        ];
        if required.iter().any(|v| v.is_empty()) {
            return Err(ApiError::BadRequest(MISSING_FIELDS.to_string()));
        }
        if !validate_email(&self.email) {
            return Err(ApiError::BadRequest(INVALID_EMAIL.to_string()));
        }
        Ok(())
    }

    pub fn into_new_lead(self, user_id: Option<String>) -> NewLead {
        fn optional(value: String) -> Option<String> {
            (!value.is_empty()).then_some(value)
        }

        NewLead {
            first_name: self.first_name,
            last_name: optional(self.last_name),
            company_name: self.company_name,
            website_url: optional(self.website_url),
            email: self.email,
            business_type: self.business_type,
            business_description: self.business_description,
            marketing_location: optional(self.marketing_location),
            city: self.city,
            country: optional(self.country),
            user_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Public short hash used in the results link
    pub identifier: String,
}

/// POST /api/generate
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let body = json_body(payload)?;
    let form = IntakeForm::from_json(&body);
    form.validate()?;

    let category = category_of(&form.business_type).unwrap_or("Custom");
    let new_lead = form.into_new_lead(user_id_from_headers(&headers));

    let lead = db::insert_lead(&state.db, &new_lead).await.map_err(|e| {
        error!(error = %e, "Failed to insert lead");
        ApiError::Internal("Failed to create lead".to_string())
    })?;

    info!(
        lead_id = %lead.id,
        business_type = %lead.business_type,
        category,
        "Lead created"
    );

    if let Err(e) = db::queue_run(&state.db, lead.id, state.scripts_per_lead as i64).await {
        error!(lead_id = %lead.id, error = %e, "Failed to record queued generation run");
    }

    state.event_bus.emit_lossy(LeadEvent::LeadCreated {
        lead_id: lead.id,
        company_name: lead.company_name.clone(),
        timestamp: Utc::now(),
    });

    if let Err(e) = state.jobs.enqueue_generation(lead.clone()) {
        error!(lead_id = %lead.id, error = %e, "Failed to queue script generation");
        mark_enqueue_failed(&state, lead.id, &e.to_string()).await;
    }

    if let Err(e) = state.jobs.enqueue_crm_sync(lead.clone()) {
        warn!(lead_id = %lead.id, error = %e, "Failed to queue CRM sync");
    }

    Ok(Json(GenerateResponse {
        identifier: lead.short_hash,
    }))
}

/// Leave the lead regenerable when it never reached a worker
pub(crate) async fn mark_enqueue_failed(state: &AppState, lead_id: uuid::Uuid, reason: &str) {
    let message = format!("Could not queue generation: {}", reason);
    if let Err(e) = db::finish_run(
        &state.db,
        lead_id,
        GenerationState::Failed,
        RunOutcome::default(),
        Some(&message),
    )
    .await
    {
        error!(lead_id = %lead_id, error = %e, "Failed to record failed run");
    }
    state.event_bus.emit_lossy(LeadEvent::GenerationFailed {
        lead_id,
        error: message,
        timestamp: Utc::now(),
    });
}

pub fn intake_routes(limiter: Arc<FixedWindowLimiter>) -> Router<AppState> {
    Router::new()
        .route("/api/generate", post(generate))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
}
