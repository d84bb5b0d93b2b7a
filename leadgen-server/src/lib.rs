//! leadgen-server library
//!
//! Lead intake, background script generation, CRM sync, results streaming and
//! the admin API. The binary in `main.rs` wires configuration and real
//! clients; tests build the same router with fakes.

use axum::Router;
use chrono::{DateTime, Utc};
use leadgen_common::config::TomlConfig;
use leadgen_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub mod api;
pub mod business_types;
pub mod crm;
pub mod error;
pub mod generation;
pub mod jobs;
pub mod llm;
pub mod rate_limit;
pub mod results;

pub use error::{ApiError, ApiResult};

use crm::{CrmClient, CrmSettings, CrmSync};
use generation::{GeneratorSettings, ScriptGenerator};
use jobs::{JobQueue, JobWorkers};
use llm::CompletionClient;
use rate_limit::FixedWindowLimiter;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub jobs: JobQueue,
    /// Limiter for POST /api/generate
    pub intake_limiter: Arc<FixedWindowLimiter>,
    /// Limiter for the results endpoints
    pub results_limiter: Arc<FixedWindowLimiter>,
    pub scripts_per_lead: usize,
    pub startup_time: DateTime<Utc>,
}

/// A configured CRM client and where its contacts go
pub struct CrmTarget {
    pub client: Arc<dyn CrmClient>,
    pub settings: CrmSettings,
}

/// Startup database housekeeping, run before the workers start
///
/// Seeds the configured bootstrap admins and fails runs a previous process
/// left `queued` or `running`, so admins can regenerate them.
pub async fn prepare_database(db: &SqlitePool, config: &TomlConfig) -> leadgen_common::Result<()> {
    for user_id in &config.admin.bootstrap_admins {
        leadgen_common::db::upsert_profile(db, user_id, None, true).await?;
        info!(user_id = %user_id, "Seeded admin profile");
    }

    let interrupted = leadgen_common::db::fail_interrupted_runs(db).await?;
    if interrupted > 0 {
        warn!(interrupted, "Marked unfinished generation runs as failed");
    }
    Ok(())
}

/// Create the event bus, generator, CRM sync and job workers
pub fn start_services(
    db: SqlitePool,
    config: &TomlConfig,
    completion: Arc<dyn CompletionClient>,
    crm: Option<CrmTarget>,
) -> (AppState, JobWorkers) {
    let event_bus = EventBus::new(config.server.event_capacity);

    let generator = Arc::new(ScriptGenerator::new(
        completion,
        db.clone(),
        event_bus.clone(),
        GeneratorSettings::from_config(&config.generation),
    ));

    let crm_sync = crm.map(|target| {
        Arc::new(CrmSync::new(
            target.client,
            db.clone(),
            event_bus.clone(),
            target.settings,
        ))
    });

    let (jobs, workers) = JobQueue::start(
        generator,
        crm_sync,
        config.generation.queue_capacity,
        config.generation.max_concurrent_jobs,
    );

    let state = AppState {
        db,
        event_bus,
        jobs,
        intake_limiter: Arc::new(FixedWindowLimiter::from_config(
            "intake",
            config.rate_limits.intake,
        )),
        results_limiter: Arc::new(FixedWindowLimiter::from_config(
            "results",
            config.rate_limits.results,
        )),
        scripts_per_lead: config.generation.scripts_per_lead,
        startup_time: Utc::now(),
    };

    (state, workers)
}

/// Build application router
///
/// Health and the business-type catalogue are open; intake and results are
/// rate limited per client; admin routes require an admin `X-User-Id`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::catalogue_routes())
        .merge(api::intake_routes(state.intake_limiter.clone()))
        .merge(api::results_routes(state.results_limiter.clone()))
        .merge(api::admin_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
