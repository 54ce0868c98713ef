//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "genbroker_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "genbroker_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "genbroker_http_requests_in_flight";

    // Action metrics
    pub const ACTIONS_TOTAL: &str = "genbroker_actions_total";
    pub const JOBS_SUBMITTED_TOTAL: &str = "genbroker_jobs_submitted_total";
    pub const STATUS_DELIVERED_TOTAL: &str = "genbroker_status_delivered_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "genbroker_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", route_label(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the outcome of one action.
pub fn record_action(action: &str, outcome: &str) {
    let labels = [("action", action.to_string()), ("outcome", outcome.to_string())];
    counter!(names::ACTIONS_TOTAL, &labels).increment(1);
}

pub fn record_job_submitted(model: &str) {
    let labels = [("model", model.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_status_delivered(state: &str) {
    let labels = [("state", state.to_string())];
    counter!(names::STATUS_DELIVERED_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", route_label(endpoint).to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse paths to the known routes so scanners can't inflate label cardinality.
fn route_label(path: &str) -> &'static str {
    match path {
        "/api/generate" => "/api/generate",
        "/generate" => "/generate",
        "/health" | "/healthz" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "other",
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
