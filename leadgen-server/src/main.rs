//! leadgen-server - lead capture and script generation service
//!
//! Startup order: tracing, build identification, configuration, secrets,
//! database, admin seeding and run recovery, workers, HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use leadgen_common::config::{
    self, TomlConfig, ENV_COMPLETION_API_KEY, ENV_CRM_API_KEY, ENV_CRM_LOCATION_ID,
    ENV_CRM_WORKFLOW_ID,
};
use leadgen_common::db;
use leadgen_server::crm::{CrmSettings, GoHighLevelClient};
use leadgen_server::llm::openrouter::{OpenRouterClient, OpenRouterSettings};
use leadgen_server::{build_router, prepare_database, rate_limit, start_services, CrmTarget};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "leadgen-server")]
#[command(about = "Lead capture and AI video script generation service")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "LEADGEN_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port (overrides server.port)
    #[arg(short, long, env = "LEADGEN_PORT")]
    port: Option<u16>,

    /// SQLite database path (overrides database.path)
    #[arg(short, long, env = "LEADGEN_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read before tracing init so logging.level can seed the filter
    let config_result = config::load_toml_config(args.config.as_deref());
    let default_level = config_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting leadgen-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = config_result.context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    let api_key = config::resolve_secret(
        ENV_COMPLETION_API_KEY,
        config.generation.api_key.as_ref(),
    )
    .with_context(|| {
        format!(
            "No completion API key: set {} or generation.api_key",
            ENV_COMPLETION_API_KEY
        )
    })?;

    let completion = OpenRouterClient::new(OpenRouterSettings {
        base_url: config.generation.api_base_url.clone(),
        api_key,
        model: config.generation.model.clone(),
        temperature: config.generation.temperature,
        request_timeout: Duration::from_secs(config.generation.request_timeout_secs),
        requests_per_minute: config.generation.requests_per_minute,
    })
    .context("Failed to create completion client")?;
    info!(model = %completion.model(), "Completion client ready");

    let crm = crm_target(&config)?;

    info!("Database: {}", config.database.path.display());
    let pool = db::init_database(&config.database.path)
        .await
        .context("Failed to initialize database")?;

    prepare_database(&pool, &config)
        .await
        .context("Failed to prepare database")?;

    let (state, workers) = start_services(pool.clone(), &config, Arc::new(completion), crm);

    let sweeper = rate_limit::spawn_sweeper(
        vec![state.intake_limiter.clone(), state.results_limiter.clone()],
        Duration::from_secs(60),
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // SSE connections stay open indefinitely, so graceful shutdown is bounded
    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        trigger.notify_one();
    })
    .into_future();

    tokio::select! {
        result = server => result.context("Server error")?,
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            warn!("Connections still open after {:?}, stopping anyway", SHUTDOWN_GRACE);
        }
    }

    sweeper.abort();
    info!("Waiting for in-flight jobs");
    if tokio::time::timeout(SHUTDOWN_GRACE, workers.join()).await.is_err() {
        warn!("Jobs still running after {:?}, abandoning them", SHUTDOWN_GRACE);
    }
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Command-line values win over the TOML file
fn apply_overrides(config: &mut TomlConfig, args: &Args) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = &args.database {
        config.database.path = path.clone();
    }
}

/// CRM client when both the API key and location id resolve
fn crm_target(config: &TomlConfig) -> Result<Option<CrmTarget>> {
    let api_key = config::resolve_secret(ENV_CRM_API_KEY, config.crm.api_key.as_ref());
    let location_id = config::resolve_secret(ENV_CRM_LOCATION_ID, config.crm.location_id.as_ref());

    let (Some(api_key), Some(location_id)) = (api_key, location_id) else {
        warn!("CRM integration not configured, leads will not be synced");
        return Ok(None);
    };

    let client = GoHighLevelClient::new(&config.crm.base_url, api_key)
        .context("Failed to create CRM client")?;
    let workflow_id = config::resolve_secret(ENV_CRM_WORKFLOW_ID, config.crm.workflow_id.as_ref());
    info!(workflow = workflow_id.is_some(), "CRM integration enabled");

    Ok(Some(CrmTarget {
        client: Arc::new(client),
        settings: CrmSettings {
            location_id,
            workflow_id,
            source: config.crm.source.clone(),
        },
    }))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
