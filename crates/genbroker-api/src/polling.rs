//! Polling protocol for background jobs.

use tracing::info;

use genbroker_models::{JobId, PollResponse};
use genbroker_store::JobStore;

use crate::error::ApiResult;
use crate::metrics;

/// Deliver a job's Status at most once.
///
/// A missing Status answers `pending`, whether the job is still running,
/// expired, or never existed. A present Status is deleted as it is read; if
/// the response carrying it never reaches the client, the result is lost.
pub async fn check_status(jobs: &JobStore, job_id: &JobId) -> ApiResult<PollResponse> {
    match jobs.take_status(job_id).await? {
        Some(status) => {
            info!(job_id = %job_id, state = status.outcome.as_str(), "Delivered job status");
            metrics::record_status_delivered(status.outcome.as_str());
            Ok(status.into())
        }
        None => Ok(PollResponse::Pending),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use genbroker_models::{GenerationResult, JobStatus};
    use genbroker_store::MemoryStore;

    #[tokio::test]
    async fn test_status_is_delivered_once() {
        let jobs = JobStore::new(Arc::new(MemoryStore::new()));
        let id = JobId::new();

        assert!(check_status(&jobs, &id).await.unwrap().is_pending());

        jobs.put_status(&JobStatus::failed(id.clone(), "quota exhausted"), 60)
            .await
            .unwrap();

        assert_eq!(
            check_status(&jobs, &id).await.unwrap(),
            PollResponse::Error {
                error_message: "quota exhausted".into()
            }
        );
        assert!(check_status(&jobs, &id).await.unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_complete_status_carries_result() {
        let jobs = JobStore::new(Arc::new(MemoryStore::new()));
        let id = JobId::new();
        let result = GenerationResult::image("AAAA", "cat");
        jobs.put_status(&JobStatus::complete(id.clone(), result.clone()), 60)
            .await
            .unwrap();

        assert_eq!(
            check_status(&jobs, &id).await.unwrap(),
            PollResponse::Complete { result }
        );
    }
}
