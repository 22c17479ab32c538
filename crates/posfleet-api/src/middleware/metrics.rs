//! # Prometheus Metrics
//!
//! Per-request counters and latency histograms recorded through the
//! `metrics` facade. The exporter installed in `main.rs` renders them at
//! `/metrics`; with no recorder installed the macros are no-ops.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Record `posfleet_http_requests_total` and
/// `posfleet_http_request_duration_seconds`, labelled by method, matched
/// route template and status.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    // Route templates keep label cardinality bounded.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "posfleet_http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(
        "posfleet_http_request_duration_seconds",
        "method" => method,
        "route" => route,
    )
    .record(started.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    #[test]
    fn test_counts_requests_by_route_template() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let app = Router::new()
            .route("/items/{id}", get(|| async { "ok" }))
            .layer(from_fn(metrics_middleware));

        let response = metrics::with_local_recorder(&recorder, || {
            let fut = app.oneshot(
                axum::http::Request::builder()
                    .uri("/items/42")
                    .body(Body::empty())
                    .unwrap(),
            );
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(fut)
        })
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let rendered = handle.render();
        assert!(rendered.contains("posfleet_http_requests_total"));
        assert!(rendered.contains("route=\"/items/{id}\""));
        assert!(!rendered.contains("/items/42"));
    }
}
