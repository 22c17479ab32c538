//! # posfleet-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the terminal fleet.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use posfleet_api::state::{AppConfig, AppState, LogFormat};
use posfleet_provisioning::{Fleet, FleetConfig, TracingHook};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let fleet_config = match &config.fleet_config {
        Some(path) => {
            let loaded = FleetConfig::load(path).map_err(|e| {
                tracing::error!("Fleet configuration failed: {e}");
                e
            })?;
            tracing::info!(path = %path.display(), reasons = loaded.reasons.len(), "fleet configuration loaded");
            loaded
        }
        None => {
            tracing::info!("FLEET_CONFIG not set, using default fleet configuration");
            FleetConfig::default()
        }
    };

    let metrics = PrometheusBuilder::new().install_recorder().map_err(|e| {
        tracing::error!("Prometheus recorder installation failed: {e}");
        e
    })?;

    let fleet = Fleet::new(fleet_config);
    fleet.add_hook(Arc::new(TracingHook));

    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, /v1 endpoints are unauthenticated");
    }

    let port = config.port;
    let state = AppState::with_config(fleet, config).with_metrics(metrics);
    let app = posfleet_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("posfleet API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
