//! Provider metrics.
//!
//! - Request counters by provider call and HTTP status
//! - Latency histograms
//! - Long-running operation poll counter

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total provider requests by call and status.
    pub const REQUESTS_TOTAL: &str = "genbroker_provider_requests_total";

    /// Provider request latency in seconds by call.
    pub const LATENCY_SECONDS: &str = "genbroker_provider_latency_seconds";

    /// Total long-running operation status queries.
    pub const LRO_POLLS_TOTAL: &str = "genbroker_lro_polls_total";
}

/// Record metrics for a completed provider request.
pub fn record_request(provider: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "provider" => provider.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "provider" => provider.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record one operation status query.
pub fn record_lro_poll() {
    counter!(names::LRO_POLLS_TOTAL).increment(1);
}
