//! Job definitions for deferred generation work.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::generation::GenerationParams;
use crate::model::{CapabilityClass, ModelKind};

/// Default lifetime of a Job or Status entry in the store (1 hour).
pub const DEFAULT_JOB_TTL_SECS: u64 = 3600;

/// Unique identifier shared by a Job and its eventual Status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate job ID format before it is used to build a store key.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars.
pub fn is_valid_job_id(id: &str) -> bool {
    if id.len() > 64 || id.len() < 8 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// A unit of deferred generation work.
///
/// Created once on the async path and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Credential pool the worker draws from
    pub capability: CapabilityClass,

    /// Target model
    pub model: ModelKind,

    /// Provider-agnostic generation parameters
    pub payload: GenerationParams,

    /// Rotation index supplied by the client
    pub rotation_index: u64,

    /// Prior attempts already spent on this work
    #[serde(default)]
    pub retry_count: u32,

    /// Submission timestamp
    pub submitted_at: DateTime<Utc>,

    /// Store lifetime in seconds
    pub ttl_secs: u64,
}

impl Job {
    /// Create a new job for `model` with a fresh ID.
    pub fn new(model: ModelKind, payload: GenerationParams, rotation_index: u64, ttl_secs: u64) -> Self {
        Self {
            id: JobId::new(),
            capability: model.capability(),
            model,
            payload,
            rotation_index,
            retry_count: 0,
            submitted_at: Utc::now(),
            ttl_secs: ttl_secs.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_job_ids() {
        assert!(is_valid_job_id("12345678"));
        assert!(is_valid_job_id("abc-1234-def"));
        assert!(is_valid_job_id(JobId::new().as_str()));
    }

    #[test]
    fn test_invalid_job_ids() {
        assert!(!is_valid_job_id(""));
        assert!(!is_valid_job_id("short"));
        assert!(!is_valid_job_id("has space in it"));
        assert!(!is_valid_job_id("has_underscore"));
        assert!(!is_valid_job_id("../../etc/passwd"));
        assert!(!is_valid_job_id(&"a".repeat(65)));
    }

    #[test]
    fn test_new_job_derives_capability() {
        let job = Job::new(ModelKind::FlashImage, GenerationParams::new("cat"), 3, 3600);
        assert_eq!(job.capability, CapabilityClass::FlashImage);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.ttl_secs, 3600);
    }

    #[test]
    fn test_job_wire_format_is_camel_case() {
        let job = Job::new(ModelKind::Imagen, GenerationParams::new("cat"), 0, 60);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["model"], "imagen-3.0-generate");
        assert_eq!(value["capability"], "default");
        assert!(value.get("rotationIndex").is_some());
        assert!(value.get("submittedAt").is_some());
    }
}
