//! Admin dashboard API
//!
//! Every route here sits behind [`super::admin_middleware`].

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    middleware,
    response::sse::{Event, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::Stream;
use leadgen_common::db::{self, GeneratedScript, GenerationRun, GenerationState, Lead, UserProfile};
use leadgen_common::sse::{json_event, lead_event, with_heartbeat};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::{admin_middleware, AdminUser};
use super::intake::mark_enqueue_failed;
use super::json_body;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct LeadList {
    pub leads: Vec<Lead>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeadDetail {
    pub lead: Lead,
    pub scripts: Vec<GeneratedScript>,
    pub generation: Option<GenerationRun>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<UserProfile>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDetail {
    pub user: UserProfile,
    pub leads: Vec<Lead>,
    pub scripts: Vec<GeneratedScript>,
}

#[derive(Debug, Deserialize)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegenerateResponse {
    pub lead_id: Uuid,
    pub state: GenerationState,
}

fn parse_lead_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid lead id: {}", raw)))
}

async fn load_lead(state: &AppState, raw_id: &str) -> ApiResult<Lead> {
    let id = parse_lead_id(raw_id)?;
    db::find_lead_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Lead not found: {}", id)))
}

/// GET /api/admin/leads
pub async fn list_leads(State(state): State<AppState>) -> ApiResult<Json<LeadList>> {
    let leads = db::list_leads(&state.db).await?;
    Ok(Json(LeadList {
        total: leads.len(),
        leads,
    }))
}

/// GET /api/admin/leads/:id
pub async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LeadDetail>> {
    let lead = load_lead(&state, &id).await?;
    let scripts = db::list_scripts_for_lead(&state.db, lead.id).await?;
    let generation = db::find_run(&state.db, lead.id).await?;
    Ok(Json(LeadDetail {
        lead,
        scripts,
        generation,
    }))
}

/// POST /api/admin/leads/:id/regenerate
///
/// Only a lead whose run failed before producing any script can be re-run;
/// partial batches are never topped up.
pub async fn regenerate_lead(
    State(state): State<AppState>,
    Extension(AdminUser(admin_id)): Extension<AdminUser>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<RegenerateResponse>)> {
    let lead = load_lead(&state, &id).await?;

    if db::count_scripts_for_lead(&state.db, lead.id).await? > 0 {
        return Err(ApiError::Conflict(
            "Lead already has scripts; regenerate is only available for failed runs".to_string(),
        ));
    }

    if !db::requeue_failed_run(&state.db, lead.id).await? {
        return Err(ApiError::Conflict(
            "Generation has not failed for this lead".to_string(),
        ));
    }

    if let Err(e) = state.jobs.enqueue_generation(lead.clone()) {
        mark_enqueue_failed(&state, lead.id, &e.to_string()).await;
        return Err(ApiError::Internal("Failed to queue generation".to_string()));
    }

    info!(lead_id = %lead.id, admin = %admin_id, "Generation re-queued by admin");
    Ok((
        StatusCode::ACCEPTED,
        Json(RegenerateResponse {
            lead_id: lead.id,
            state: GenerationState::Queued,
        }),
    ))
}

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<UserList>> {
    let users = db::list_profiles(&state.db).await?;
    Ok(Json(UserList {
        total: users.len(),
        users,
    }))
}

/// GET /api/admin/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserDetail>> {
    let user = db::find_profile(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", user_id)))?;
    let leads = db::list_leads_for_user(&state.db, &user_id).await?;
    let scripts = db::list_scripts_for_user(&state.db, &user_id).await?;
    Ok(Json(UserDetail {
        user,
        leads,
        scripts,
    }))
}

/// PUT /api/admin/users/:id/admin
pub async fn set_user_admin(
    State(state): State<AppState>,
    Extension(AdminUser(admin_id)): Extension<AdminUser>,
    Path(user_id): Path<String>,
    payload: Result<Json<SetAdminRequest>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let request = json_body(payload)?;

    let profile = db::set_admin_flag(&state.db, &user_id, request.is_admin)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", user_id)))?;

    info!(
        user_id = %user_id,
        is_admin = request.is_admin,
        changed_by = %admin_id,
        "Admin flag updated"
    );
    Ok(Json(profile))
}

/// GET /api/admin/events
///
/// Every lead event, named after its type. A `lagged` event tells the
/// dashboard to reload after the stream dropped events.
pub async fn admin_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();
    info!("Admin event stream opened");

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(sse) = lead_event(&event) {
                        yield Ok(sse);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Admin event stream lagged");
                    if let Some(sse) = json_event("lagged", &json!({ "missed": missed })) {
                        yield Ok(sse);
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    with_heartbeat(stream)
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/admin/leads", get(list_leads))
        .route("/api/admin/leads/:id", get(get_lead))
        .route("/api/admin/leads/:id/regenerate", post(regenerate_lead))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id", get(get_user))
        .route("/api/admin/users/:id/admin", put(set_user_admin))
        .route("/api/admin/events", get(admin_events))
        .route_layer(middleware::from_fn_with_state(state, admin_middleware))
}
