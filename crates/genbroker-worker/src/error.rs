//! Worker error types.

use thiserror::Error;

use genbroker_providers::ProviderError;
use genbroker_store::{QueueError, StoreError};

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Whether redelivering the message could succeed.
    ///
    /// Content refusals and configuration problems fail the same way on
    /// every delivery.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Provider(e) => e.is_retryable(),
            WorkerError::Store(_) | WorkerError::Queue(_) => true,
            WorkerError::JobFailed(_) => false,
        }
    }
}
