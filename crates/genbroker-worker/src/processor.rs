//! Execution of a single Job.
//!
//! The processor is queue-agnostic: it loads the Job, runs the provider and
//! writes the Status. Redelivery bookkeeping belongs to the executor.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn, Instrument};

use genbroker_models::{
    GenerationRequest, GenerationResult, Job, JobId, JobStatus, RecordEntry,
};
use genbroker_providers::{BackgroundTasks, CredentialPool, ProviderRegistry, RecordSink};
use genbroker_store::JobStore;

use crate::error::WorkerResult;
use crate::metrics;
use crate::retry::{with_backoff, RetryPolicy};

/// Where a delivery stands among the allowed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// Failed deliveries before this one
    pub attempt: u32,
    /// No redelivery follows this one
    pub is_last: bool,
}

impl Delivery {
    pub fn first() -> Self {
        Self {
            attempt: 0,
            is_last: false,
        }
    }

    pub fn new(attempt: u32, max_attempts: u32) -> Self {
        Self {
            attempt,
            is_last: attempt.saturating_add(1) >= max_attempts,
        }
    }
}

/// What the executor should do with the message after processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDisposition {
    /// `complete` Status written
    Completed,
    /// `error` Status written for a failure that would recur
    Failed,
    /// Job expired or never existed; nothing written
    Missing,
    /// Transient failure; nothing written, redeliver
    Retry(String),
    /// Transient failure on the last delivery; `error` Status written
    Exhausted(String),
}

pub struct JobProcessor {
    jobs: JobStore,
    registry: ProviderRegistry,
    pool: Arc<CredentialPool>,
    record_sink: Arc<RecordSink>,
    tasks: BackgroundTasks,
    status_ttl_secs: u64,
    write_policy: RetryPolicy,
}

impl JobProcessor {
    pub fn new(
        jobs: JobStore,
        registry: ProviderRegistry,
        pool: Arc<CredentialPool>,
        record_sink: Arc<RecordSink>,
        tasks: BackgroundTasks,
        status_ttl_secs: u64,
    ) -> Self {
        Self {
            jobs,
            registry,
            pool,
            record_sink,
            tasks,
            status_ttl_secs: status_ttl_secs.max(1),
            write_policy: RetryPolicy::default(),
        }
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Rotation index for a delivery; each redelivery moves to the next credential.
    pub fn credential_index(job: &Job, delivery: Delivery) -> u64 {
        job.rotation_index
            .wrapping_add(u64::from(job.retry_count))
            .wrapping_add(u64::from(delivery.attempt))
    }

    /// Run one delivery of `job_id`.
    ///
    /// Errors are store failures while reading the Job or writing the Status.
    pub async fn process(&self, job_id: &JobId, delivery: Delivery) -> WorkerResult<JobDisposition> {
        let Some(job) = self.jobs.get_job(job_id).await? else {
            info!(job_id = %job_id, "Job missing or expired, skipping");
            return Ok(JobDisposition::Missing);
        };

        let span = info_span!("job", job_id = %job.id, model = %job.model, attempt = delivery.attempt);
        let start = Instant::now();
        let outcome = self.generate(&job, delivery).instrument(span).await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(result) => {
                info!(job_id = %job.id, summary = %result.summary(), "Job complete");
                self.record(RecordEntry::success(
                    job.payload.prompt.clone(),
                    job.model.as_str(),
                    &result,
                ));
                self.write_status(JobStatus::complete(job.id.clone(), result)).await?;
                self.discard_job(&job.id).await;
                metrics::record_job(job.model.as_str(), "complete", elapsed);
                Ok(JobDisposition::Completed)
            }
            Err(e) if e.is_retryable() && !delivery.is_last => {
                warn!(job_id = %job.id, attempt = delivery.attempt, "Job attempt failed, will retry: {}", e);
                metrics::record_job(job.model.as_str(), "retry", elapsed);
                Ok(JobDisposition::Retry(e.to_string()))
            }
            Err(e) => {
                let message = e.to_string();
                warn!(job_id = %job.id, "Job failed: {}", message);
                self.fail(&job, &message).await?;
                metrics::record_job(job.model.as_str(), "error", elapsed);

                if e.is_retryable() {
                    Ok(JobDisposition::Exhausted(message))
                } else {
                    Ok(JobDisposition::Failed)
                }
            }
        }
    }

    async fn generate(&self, job: &Job, delivery: Delivery) -> WorkerResult<GenerationResult> {
        let credential = self
            .pool
            .get_key(job.capability, Self::credential_index(job, delivery))?;
        let provider = self.registry.get(job.model)?;
        let request = job_request(job);
        Ok(provider.generate(&request, credential).await?)
    }

    async fn fail(&self, job: &Job, message: &str) -> WorkerResult<()> {
        self.record(RecordEntry::error(
            job.payload.prompt.clone(),
            job.model.as_str(),
            message,
        ));
        self.write_status(JobStatus::failed(job.id.clone(), message)).await?;
        self.discard_job(&job.id).await;
        Ok(())
    }

    async fn write_status(&self, status: JobStatus) -> WorkerResult<()> {
        with_backoff(&self.write_policy, "put_status", || {
            self.jobs.put_status(&status, self.status_ttl_secs)
        })
        .await?;
        Ok(())
    }

    /// The Status is the only thing pollers read once it exists.
    async fn discard_job(&self, job_id: &JobId) {
        if let Err(e) = self.jobs.delete_job(job_id).await {
            warn!(job_id = %job_id, "Failed to delete finished job: {}", e);
        }
    }

    fn record(&self, entry: RecordEntry) {
        self.record_sink.record_in_background(&self.tasks, entry);
    }
}

/// Jobs carrying a base image on an edit-capable model are edits.
fn job_request(job: &Job) -> GenerationRequest {
    if job.model.supports_edit() && job.payload.base_image.is_some() {
        GenerationRequest::edit(job.model, job.payload.clone())
    } else {
        GenerationRequest::generate(job.model, job.payload.clone())
    }
}
