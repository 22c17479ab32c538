//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The ledger itself lives in [`Fleet`], which is already a cloneable
//! handle around a `parking_lot` lock. Handlers call it synchronously and
//! never hold the lock across `.await`.

use std::path::PathBuf;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use posfleet_provisioning::{Fleet, FleetConfig};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Process configuration, read from the environment.
#[derive(Clone)]
pub struct AppConfig {
    /// Listen port (`PORT`, default 8080).
    pub port: u16,
    /// Bearer secret (`AUTH_TOKEN`). `None` disables authentication.
    pub auth_token: Option<String>,
    /// Fleet configuration file (`FLEET_CONFIG`). Defaults apply when unset.
    pub fleet_config: Option<PathBuf>,
    /// `LOG_FORMAT=json` switches to JSON log lines.
    pub log_format: LogFormat,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("fleet_config", &self.fleet_config)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            fleet_config: None,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    /// Build configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let port = get("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080);
        let auth_token = get("AUTH_TOKEN").filter(|t| !t.is_empty());
        let fleet_config = get("FLEET_CONFIG").filter(|p| !p.is_empty()).map(PathBuf::from);
        let log_format = match get("LOG_FORMAT").as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            port,
            auth_token,
            fleet_config,
            log_format,
        }
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub fleet: Fleet,
    pub config: Arc<AppConfig>,
    /// Renders `/metrics`. Absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// A fresh fleet with default configuration and auth disabled.
    pub fn new() -> Self {
        Self::with_config(Fleet::new(FleetConfig::default()), AppConfig::default())
    }

    pub fn with_config(fleet: Fleet, config: AppConfig) -> Self {
        Self {
            fleet,
            config: Arc::new(config),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
