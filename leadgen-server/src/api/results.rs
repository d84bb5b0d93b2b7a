//! Results reader endpoints
//!
//! `GET /api/results/:identifier` returns everything stored so far.
//! `GET /api/results/:identifier/events` streams scripts as they are saved:
//! the stream subscribes to the event bus before its initial read, so a row
//! inserted in between arrives on both paths and is de-duplicated.

use axum::{
    extract::{Path, State},
    middleware,
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use leadgen_common::db::{self, GeneratedScript, GenerationRun, GenerationState, Lead, LeadSummary};
use leadgen_common::events::LeadEvent;
use leadgen_common::sanitize::validate_str;
use leadgen_common::sse::{json_event, with_heartbeat};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::rate_limit::{rate_limit_middleware, FixedWindowLimiter};
use crate::results::ScriptCollection;
use crate::AppState;

/// Identifiers are a UUID (36 chars) or a short hash (32 chars)
const MAX_IDENTIFIER_LEN: usize = 36;

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub lead: LeadSummary,
    pub scripts: Vec<GeneratedScript>,
    pub generation: Option<GenerationRun>,
}

/// Data of the final `complete` SSE event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletePayload {
    pub state: GenerationState,
    pub scripts_saved: usize,
    pub error: Option<String>,
}

impl CompletePayload {
    fn from_run(run: &GenerationRun) -> Self {
        Self {
            state: run.state,
            scripts_saved: run.scripts_saved.max(0) as usize,
            error: run.error.clone(),
        }
    }

    fn from_event(event: &LeadEvent) -> Option<Self> {
        match event {
            LeadEvent::GenerationCompleted { scripts_saved, .. } => Some(Self {
                state: GenerationState::Completed,
                scripts_saved: *scripts_saved,
                error: None,
            }),
            LeadEvent::GenerationFailed { error, .. } => Some(Self {
                state: GenerationState::Failed,
                scripts_saved: 0,
                error: Some(error.clone()),
            }),
            _ => None,
        }
    }
}

async fn resolve_lead(state: &AppState, identifier: &str) -> ApiResult<Lead> {
    let identifier = validate_str(identifier, MAX_IDENTIFIER_LEN);
    db::find_lead_by_identifier(&state.db, &identifier)
        .await?
        .ok_or_else(|| ApiError::NotFound("Results not found".to_string()))
}

/// GET /api/results/:identifier
pub async fn get_results(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<ResultsResponse>> {
    let lead = resolve_lead(&state, &identifier).await?;
    let scripts = db::list_scripts_for_lead(&state.db, lead.id).await?;
    let generation = db::find_run(&state.db, lead.id).await?;

    debug!(lead_id = %lead.id, scripts = scripts.len(), "Results read");

    Ok(Json(ResultsResponse {
        lead: LeadSummary::from(&lead),
        scripts,
        generation,
    }))
}

/// GET /api/results/:identifier/events
///
/// Events: `script` (one stored row), `complete` (run finished), plus
/// heartbeat comments.
pub async fn results_events(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let lead = resolve_lead(&state, &identifier).await?;
    let lead_id = lead.id;

    let mut rx = state.event_bus.subscribe();
    let initial = db::list_scripts_for_lead(&state.db, lead_id).await?;
    let initial_run = db::find_run(&state.db, lead_id).await?;
    let pool = state.db.clone();

    info!(lead_id = %lead_id, initial = initial.len(), "Results stream opened");

    let stream = async_stream::stream! {
        let mut collection = ScriptCollection::new();

        for script in collection.merge(initial) {
            if let Some(event) = json_event("script", &script) {
                yield Ok(event);
            }
        }

        if let Some(run) = initial_run.as_ref().filter(|r| r.state.is_terminal()) {
            if let Some(event) = json_event("complete", &CompletePayload::from_run(run)) {
                yield Ok(event);
            }
            return;
        }

        loop {
            match rx.recv().await {
                Ok(event) if event.lead_id() != lead_id => {}
                Ok(LeadEvent::ScriptSaved { script, .. }) => {
                    if collection.insert(script.clone()) {
                        if let Some(event) = json_event("script", &script) {
                            yield Ok(event);
                        }
                    }
                }
                Ok(event) if event.is_generation_terminal() => {
                    if let Some(payload) = CompletePayload::from_event(&event) {
                        if let Some(event) = json_event("complete", &payload) {
                            yield Ok(event);
                        }
                    }
                    break;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(lead_id = %lead_id, missed, "Results stream lagged, re-reading scripts");
                    match db::list_scripts_for_lead(&pool, lead_id).await {
                        Ok(rows) => {
                            for script in collection.merge(rows) {
                                if let Some(event) = json_event("script", &script) {
                                    yield Ok(event);
                                }
                            }
                        }
                        Err(e) => error!(lead_id = %lead_id, error = %e, "Re-read after lag failed"),
                    }
                    if let Ok(Some(run)) = db::find_run(&pool, lead_id).await {
                        if run.state.is_terminal() {
                            if let Some(event) = json_event("complete", &CompletePayload::from_run(&run)) {
                                yield Ok(event);
                            }
                            break;
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }

        debug!(lead_id = %lead_id, delivered = collection.len(), "Results stream finished");
    };

    Ok(with_heartbeat(stream))
}

pub fn results_routes(limiter: Arc<FixedWindowLimiter>) -> Router<AppState> {
    Router::new()
        .route("/api/results/:identifier", get(get_results))
        .route("/api/results/:identifier/events", get(results_events))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
}
