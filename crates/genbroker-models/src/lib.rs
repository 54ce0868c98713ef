//! Shared data models for the generation broker.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their Status entries
//! - Model and capability enums
//! - Generation parameters and results
//! - Record-sink audit entries

pub mod generation;
pub mod job;
pub mod model;
pub mod record;
pub mod status;

// Re-export common types
pub use generation::{GenerationMode, GenerationParams, GenerationRequest, GenerationResult};
pub use job::{is_valid_job_id, Job, JobId, DEFAULT_JOB_TTL_SECS};
pub use model::{CapabilityClass, ModelKind, UnknownModel};
pub use record::RecordEntry;
pub use status::{JobOutcome, JobStatus, PollResponse};
