//! Configuration loading
//!
//! Four sources, highest precedence first:
//! 1. Command-line arguments (applied by the binary on top of the loaded config)
//! 2. Environment variables (secrets only: API keys and CRM identifiers)
//! 3. TOML bootstrap file
//! 4. Built-in defaults (code constants)
//!
//! A missing default config file is not an error; every section has defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the chat-completion API key
pub const ENV_COMPLETION_API_KEY: &str = "OPENROUTER_API_KEY";
/// Environment variable holding the CRM API key
pub const ENV_CRM_API_KEY: &str = "GOHIGHLEVEL_API_KEY";
/// Environment variable holding the CRM location id
pub const ENV_CRM_LOCATION_ID: &str = "GOHIGHLEVEL_LOCATION_ID";
/// Environment variable holding the CRM workflow id
pub const ENV_CRM_WORKFLOW_ID: &str = "GOHIGHLEVEL_WORKFLOW_ID";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Capacity of the event bus broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error); RUST_LOG wins
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Script generation tunables
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Number of titles (and therefore scripts) requested per lead
    #[serde(default = "default_scripts_per_lead")]
    pub scripts_per_lead: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff after failed attempt k is `k * retry_backoff_ms`
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_title_delay_ms")]
    pub title_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            scripts_per_lead: default_scripts_per_lead(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            title_delay_ms: default_title_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Fixed-window limit for one route group
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct WindowLimit {
    pub window_secs: u64,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(default = "default_intake_limit")]
    pub intake: WindowLimit,
    #[serde(default = "default_results_limit")]
    pub results: WindowLimit,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            intake: default_intake_limit(),
            results: default_results_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrmConfig {
    #[serde(default = "default_crm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    /// Value of the `source` field on created contacts
    #[serde(default = "default_crm_source")]
    pub source: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_crm_base_url(),
            api_key: None,
            location_id: None,
            workflow_id: None,
            source: default_crm_source(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    /// User ids upserted into user_profiles with is_admin = 1 at startup
    #[serde(default)]
    pub bootstrap_admins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_event_capacity() -> usize {
    1000
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("leadgen").join("leadgen.db"))
        .unwrap_or_else(|| PathBuf::from("./leadgen_data/leadgen.db"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "openai/gpt-4.1-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_scripts_per_lead() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_title_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_intake_limit() -> WindowLimit {
    // 5 submissions per 15 minutes per client
    WindowLimit {
        window_secs: 15 * 60,
        max_requests: 5,
    }
}

fn default_results_limit() -> WindowLimit {
    WindowLimit {
        window_secs: 60,
        max_requests: 60,
    }
}

fn default_crm_base_url() -> String {
    "https://services.leadconnectorhq.com".to_string()
}

fn default_crm_source() -> String {
    "AI Content Strategist".to_string()
}

/// Default TOML location: `<config_dir>/leadgen/leadgen.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("leadgen").join("leadgen.toml"))
}

/// Load the TOML bootstrap configuration
///
/// An explicitly requested file must exist. When no path is given the default
/// location is tried and built-in defaults are used if it is absent.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => return Ok(TomlConfig::default()),
        },
    };

    if !path.exists() {
        if explicit {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        info!("No config file at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse configuration text (exposed for tests and embedding)
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.validate()?;
    Ok(config)
}

impl TomlConfig {
    /// Reject values that would make the service misbehave silently
    pub fn validate(&self) -> Result<()> {
        if self.generation.scripts_per_lead == 0 {
            return Err(Error::Config(
                "generation.scripts_per_lead must be at least 1".to_string(),
            ));
        }
        if self.generation.max_attempts == 0 {
            return Err(Error::Config(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.generation.requests_per_minute == 0 {
            return Err(Error::Config(
                "generation.requests_per_minute must be at least 1".to_string(),
            ));
        }
        if self.generation.max_concurrent_jobs == 0 || self.generation.queue_capacity == 0 {
            return Err(Error::Config(
                "generation.max_concurrent_jobs and generation.queue_capacity must be at least 1"
                    .to_string(),
            ));
        }
        if self.server.event_capacity == 0 {
            return Err(Error::Config(
                "server.event_capacity must be at least 1".to_string(),
            ));
        }
        for (name, limit) in [
            ("intake", self.rate_limits.intake),
            ("results", self.rate_limits.results),
        ] {
            if limit.window_secs == 0 || limit.max_requests == 0 {
                return Err(Error::Config(format!(
                    "rate_limits.{} needs a non-zero window_secs and max_requests",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Resolve a secret from the environment first, then the TOML value
///
/// Empty or whitespace-only values are treated as absent. A warning is logged
/// when both sources carry a value.
pub fn resolve_secret(env_var: &str, toml_value: Option<&String>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| is_valid_secret(v));
    let toml_value = toml_value.filter(|v| is_valid_secret(v)).cloned();

    match (env_value, toml_value) {
        (Some(env), Some(_)) => {
            warn!(
                "{} found in both environment and TOML config. Using environment.",
                env_var
            );
            Some(env)
        }
        (Some(env), None) => Some(env),
        (None, Some(toml)) => Some(toml),
        (None, None) => None,
    }
}

/// Validate a secret value (non-empty, non-whitespace)
pub fn is_valid_secret(value: &str) -> bool {
    !value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config.server.port, 5780);
        assert_eq!(config.generation.scripts_per_lead, 5);
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.rate_limits.intake.max_requests, 5);
        assert_eq!(config.rate_limits.intake.window_secs, 900);
        assert_eq!(config.rate_limits.results.max_requests, 60);
        assert!(config.admin.bootstrap_admins.is_empty());
    }

    #[test]
    fn test_partial_sections_keep_field_defaults() {
        let config = parse_toml_config(
            r#"
            [generation]
            scripts_per_lead = 20

            [rate_limits.intake]
            window_secs = 60
            max_requests = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.generation.scripts_per_lead, 20);
        assert_eq!(config.generation.model, "openai/gpt-4.1-mini");
        assert_eq!(config.rate_limits.intake.max_requests, 2);
        assert_eq!(config.rate_limits.results.window_secs, 60);
    }

    #[test]
    fn test_zero_scripts_rejected() {
        let err = parse_toml_config("[generation]\nscripts_per_lead = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_event_capacity_rejected() {
        let err = parse_toml_config("[server]\nevent_capacity = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.event_capacity"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = parse_toml_config(
            "[rate_limits.results]\nwindow_secs = 0\nmax_requests = 10\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("rate_limits.results"));
    }

    #[test]
    fn test_is_valid_secret() {
        assert!(is_valid_secret("sk-abc"));
        assert!(!is_valid_secret(""));
        assert!(!is_valid_secret("   "));
    }

    #[test]
    fn test_resolve_secret_falls_back_to_toml() {
        let toml_value = Some("from-toml".to_string());
        let resolved = resolve_secret("LEADGEN_TEST_UNSET_SECRET_VAR", toml_value.as_ref());
        assert_eq!(resolved.as_deref(), Some("from-toml"));

        let blank = Some("  ".to_string());
        assert_eq!(
            resolve_secret("LEADGEN_TEST_UNSET_SECRET_VAR", blank.as_ref()),
            None
        );
    }
}
