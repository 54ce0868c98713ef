//! Background job worker.
//!
//! This crate provides:
//! - Queue consumption with bounded concurrency and crash-recovery claims
//! - Per-job execution that writes exactly one Status
//! - Redelivery with credential rotation and a dead-letter stream
//! - Graceful shutdown that drains record-sink writes

pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod processor;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use processor::{Delivery, JobDisposition, JobProcessor};
