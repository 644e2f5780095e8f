//! Prometheus metrics for habitsd.
//!
//! The recorder is installed once at startup; `/metrics` renders the
//! handle. Metric names are part of the server's public contract.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Prometheus default histogram buckets.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and return a handle for rendering.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .expect("bucket list is non-empty")
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_metrics();
    handle
}

/// Build a recorder without installing it globally. Tests use this so each
/// test process can hold as many handles as it likes.
#[cfg(test)]
pub fn test_handle() -> PrometheusHandle {
    let recorder = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .expect("bucket list is non-empty")
        .build_recorder();
    recorder.handle()
}

fn describe_metrics() {
    describe_counter!(
        "habits_http_requests_total",
        "Total number of HTTP requests by endpoint, method, and status"
    );
    describe_histogram!(
        "habits_http_request_duration_seconds",
        "Duration of HTTP requests in seconds"
    );
    describe_counter!(
        "habits_user_requests_total",
        "Total number of authenticated requests per user"
    );
    describe_counter!(
        "habits_auth_events_total",
        "Total authentication events by type and result"
    );
    describe_gauge!(
        "habits_active_habits_per_user",
        "Number of active habits per user"
    );
    describe_gauge!(
        "habits_active_habits_total",
        "Total number of active habits across all users"
    );
}

/// Time every request and count it by (endpoint, method, status).
///
/// The endpoint label is the matched route pattern, not the raw path, so
/// label cardinality stays bounded.
pub async fn http_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().to_string();

    let resp = next.run(req).await;

    let status_code = resp.status().as_u16().to_string();
    counter!(
        "habits_http_requests_total",
        "endpoint" => endpoint.clone(),
        "method" => method.clone(),
        "status_code" => status_code.clone()
    )
    .increment(1);
    histogram!(
        "habits_http_request_duration_seconds",
        "endpoint" => endpoint,
        "method" => method,
        "status_code" => status_code
    )
    .record(start.elapsed().as_secs_f64());

    resp
}
