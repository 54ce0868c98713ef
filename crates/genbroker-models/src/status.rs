//! Job outcome records and the polling response.
//!
//! A Status entry is written once by whoever executed the Job and read at
//! most once by the polling client.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::generation::GenerationResult;
use crate::job::JobId;

/// Terminal outcome of a Job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobOutcome {
    Complete {
        result: GenerationResult,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Complete { .. } => "complete",
            JobOutcome::Error { .. } => "error",
        }
    }
}

/// Status entry stored under the Job's ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: JobId,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

impl JobStatus {
    /// Successful outcome.
    pub fn complete(job_id: JobId, result: GenerationResult) -> Self {
        Self {
            job_id,
            outcome: JobOutcome::Complete { result },
        }
    }

    /// Failed outcome.
    pub fn failed(job_id: JobId, error_message: impl Into<String>) -> Self {
        Self {
            job_id,
            outcome: JobOutcome::Error {
                error_message: error_message.into(),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, JobOutcome::Complete { .. })
    }
}

/// Response of the polling protocol.
///
/// `Pending` covers both "not finished yet" and "never existed / expired";
/// the two are deliberately indistinguishable to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollResponse {
    Pending,
    Complete {
        result: GenerationResult,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

impl PollResponse {
    pub fn is_pending(&self) -> bool {
        matches!(self, PollResponse::Pending)
    }
}

impl From<JobOutcome> for PollResponse {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Complete { result } => PollResponse::Complete { result },
            JobOutcome::Error { error_message } => PollResponse::Error { error_message },
        }
    }
}

impl From<JobStatus> for PollResponse {
    fn from(status: JobStatus) -> Self {
        status.outcome.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_format() {
        let status = JobStatus::complete(
            JobId::from_string("job-12345"),
            GenerationResult::image("AAAA", "cat"),
        );
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            json!({
                "jobId": "job-12345",
                "state": "complete",
                "result": {"base64": "AAAA", "translatedPrompt": "cat"}
            })
        );
    }

    #[test]
    fn test_outcome_parses_without_job_id() {
        let raw = json!({"state": "complete", "result": {"base64": "AAAA", "translatedPrompt": "cat"}});
        let outcome: JobOutcome = serde_json::from_value(raw).unwrap();
        assert_eq!(outcome.as_str(), "complete");
    }

    #[test]
    fn test_poll_response_wire_format() {
        assert_eq!(serde_json::to_value(PollResponse::Pending).unwrap(), json!({"status": "pending"}));

        let failed: PollResponse = JobStatus::failed(JobId::from_string("job-12345"), "boom").into();
        assert_eq!(
            serde_json::to_value(failed).unwrap(),
            json!({"status": "error", "errorMessage": "boom"})
        );
    }
}
