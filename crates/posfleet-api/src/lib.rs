//! # posfleet-api — HTTP Service for the Terminal Fleet
//!
//! Exposes the [`posfleet_provisioning::Fleet`] command/query surface over
//! Axum.
//!
//! ## API Surface
//!
//! | Prefix            | Module               | Domain                 |
//! |-------------------|----------------------|------------------------|
//! | `/v1/devices/*`   | [`routes::devices`]  | Device registry        |
//! | `/v1/tasks/*`     | [`routes::tasks`]    | Provisioning pipeline  |
//! | `/health/*`       | here                 | Probes (no auth)       |
//! | `/metrics`        | here                 | Prometheus (no auth)   |
//! | `/openapi.json`   | [`openapi`]          | OpenAPI (no auth)      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware (/v1 only) → Handler
//! ```

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::header;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::AuthConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Probes, metrics and the OpenAPI document stay outside the auth layer.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::devices::router())
        .merge(routes::tasks::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config));

    let public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .merge(openapi::router());

    Router::new()
        .merge(public)
        .merge(api)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .with_state(state)
}

/// Liveness probe. Returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The ledger is in memory, so ready once serving.
async fn readiness() -> &'static str {
    "ready"
}

/// Prometheus text exposition.
async fn render_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("metrics recorder not installed".into()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}
