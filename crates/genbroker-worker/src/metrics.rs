//! Worker metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const JOBS_TOTAL: &str = "genbroker_worker_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "genbroker_worker_job_duration_seconds";
    pub const REDELIVERIES_TOTAL: &str = "genbroker_worker_redeliveries_total";
    pub const DEAD_LETTERED_TOTAL: &str = "genbroker_worker_dead_lettered_total";
}

/// Record a finished job attempt.
pub fn record_job(model: &str, outcome: &str, duration_secs: f64) {
    let labels = [("model", model.to_string()), ("outcome", outcome.to_string())];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_redelivery() {
    counter!(names::REDELIVERIES_TOTAL).increment(1);
}

pub fn record_dead_lettered() {
    counter!(names::DEAD_LETTERED_TOTAL).increment(1);
}
