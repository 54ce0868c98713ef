//! Typed Job/Status mailbox on top of a [`KeyValueStore`].

use std::sync::Arc;

use tracing::{debug, info};

use genbroker_models::{Job, JobId, JobOutcome, JobStatus};

use crate::error::StoreResult;
use crate::store::KeyValueStore;

const JOB_KEY_PREFIX: &str = "genbroker:job:";
const STATUS_KEY_PREFIX: &str = "genbroker:status:";

/// Job payloads and Status entries keyed by job ID.
#[derive(Clone)]
pub struct JobStore {
    kv: Arc<dyn KeyValueStore>,
}

impl JobStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn job_key(job_id: &JobId) -> String {
        format!("{}{}", JOB_KEY_PREFIX, job_id)
    }

    pub fn status_key(job_id: &JobId) -> String {
        format!("{}{}", STATUS_KEY_PREFIX, job_id)
    }

    /// Persist a job with its own TTL.
    pub async fn put_job(&self, job: &Job) -> StoreResult<()> {
        let payload = serde_json::to_string(job)?;
        self.kv.put(&Self::job_key(&job.id), &payload, job.ttl_secs).await?;
        info!(job_id = %job.id, model = %job.model, ttl_secs = job.ttl_secs, "Stored job");
        Ok(())
    }

    pub async fn get_job(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        match self.kv.get(&Self::job_key(job_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_job(&self, job_id: &JobId) -> StoreResult<()> {
        self.kv.delete(&Self::job_key(job_id)).await
    }

    /// Write the outcome of a job. Rewrites on retry are last-write-wins.
    pub async fn put_status(&self, status: &JobStatus, ttl_secs: u64) -> StoreResult<()> {
        let payload = serde_json::to_string(status)?;
        self.kv
            .put(&Self::status_key(&status.job_id), &payload, ttl_secs)
            .await?;
        info!(job_id = %status.job_id, state = status.outcome.as_str(), "Stored job status");
        Ok(())
    }

    /// Read a status without consuming it.
    ///
    /// Entries written by external workers may omit `jobId`; the key is
    /// authoritative.
    pub async fn get_status(&self, job_id: &JobId) -> StoreResult<Option<JobStatus>> {
        match self.kv.get(&Self::status_key(job_id)).await? {
            Some(raw) => {
                let outcome: JobOutcome = serde_json::from_str(&raw)?;
                Ok(Some(JobStatus {
                    job_id: job_id.clone(),
                    outcome,
                }))
            }
            None => Ok(None),
        }
    }

    /// Read a status and delete it.
    ///
    /// The delete is issued after the read, not atomically with it, and before
    /// the caller has delivered the result anywhere. A delivery failure after
    /// this returns loses the result permanently.
    pub async fn take_status(&self, job_id: &JobId) -> StoreResult<Option<JobStatus>> {
        let status = self.get_status(job_id).await?;
        if status.is_some() {
            self.kv.delete(&Self::status_key(job_id)).await?;
            debug!(job_id = %job_id, "Consumed job status");
        }
        Ok(status)
    }

    pub async fn delete_status(&self, job_id: &JobId) -> StoreResult<()> {
        self.kv.delete(&Self::status_key(job_id)).await
    }

    /// Connectivity check.
    pub async fn ping(&self) -> StoreResult<()> {
        self.kv.ping().await
    }
}
