//! Dual-path dispatcher.
//!
//! - Sync path: credential, provider call, result inline.
//! - Async path: persist a Job, optionally publish it, return its id. The
//!   provider call happens in a worker, never here.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use genbroker_models::{
    CapabilityClass, GenerationParams, GenerationRequest, GenerationResult, Job, JobId, ModelKind,
    RecordEntry, DEFAULT_JOB_TTL_SECS,
};
use genbroker_providers::{BackgroundTasks, CredentialPool, ProviderRegistry, RecordSink, TranslateClient};
use genbroker_store::{JobQueue, JobStore};

use crate::error::ApiResult;
use crate::metrics;

pub struct Dispatcher {
    pool: Arc<CredentialPool>,
    registry: ProviderRegistry,
    translator: Arc<TranslateClient>,
    jobs: JobStore,
    queue: Option<Arc<JobQueue>>,
    record_sink: Arc<RecordSink>,
    tasks: BackgroundTasks,
    job_ttl_secs: u64,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<CredentialPool>,
        registry: ProviderRegistry,
        translator: Arc<TranslateClient>,
        jobs: JobStore,
        record_sink: Arc<RecordSink>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            pool,
            registry,
            translator,
            jobs,
            queue: None,
            record_sink,
            tasks,
            job_ttl_secs: DEFAULT_JOB_TTL_SECS,
        }
    }

    /// Publish submitted jobs to `queue` after storing them.
    pub fn with_queue(mut self, queue: Arc<JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_job_ttl(mut self, ttl_secs: u64) -> Self {
        self.job_ttl_secs = ttl_secs.max(1);
        self
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Run a generation inline.
    ///
    /// Provider failures are mirrored to the record sink in the background
    /// before being returned.
    pub async fn run_sync(
        &self,
        request: GenerationRequest,
        rotation_index: u64,
    ) -> ApiResult<GenerationResult> {
        let credential = self.pool.get_key(request.model.capability(), rotation_index)?;
        let provider = self.registry.get(request.model)?;
        let span = info_span!("sync_generation", model = %request.model, provider = provider.name());

        match provider.generate(&request, credential).instrument(span).await {
            Ok(result) => {
                info!(model = %request.model, summary = %result.summary(), "Generation complete");
                self.record(RecordEntry::success(
                    request.params.prompt.clone(),
                    request.model.as_str(),
                    &result,
                ));
                Ok(result)
            }
            Err(e) => {
                warn!(model = %request.model, kind = e.kind(), "Generation failed: {}", e);
                self.record(RecordEntry::error(
                    request.params.prompt.clone(),
                    request.model.as_str(),
                    e.to_string(),
                ));
                Err(e.into())
            }
        }
    }

    /// Store a Job and hand it to the worker side.
    pub async fn submit(
        &self,
        model: ModelKind,
        payload: GenerationParams,
        rotation_index: u64,
    ) -> ApiResult<JobId> {
        let job = Job::new(model, payload, rotation_index, self.job_ttl_secs);
        self.jobs.put_job(&job).await?;

        if let Some(queue) = &self.queue {
            if let Err(e) = queue.enqueue(&job).await {
                // An unpublished job would never run; don't leave it behind
                if let Err(cleanup) = self.jobs.delete_job(&job.id).await {
                    warn!(job_id = %job.id, "Failed to remove unpublished job: {}", cleanup);
                }
                return Err(e.into());
            }
        }

        metrics::record_job_submitted(model.as_str());
        info!(job_id = %job.id, model = %model, "Submitted background job");
        Ok(job.id)
    }

    /// Translate a prompt using the default-class credential.
    pub async fn translate(&self, prompt: &str, rotation_index: u64) -> ApiResult<String> {
        let key = self.pool.get_key(CapabilityClass::Default, rotation_index)?;
        Ok(self.translator.translate(prompt, key).await?)
    }

    /// Queue a best-effort record-sink write.
    pub fn record(&self, entry: RecordEntry) {
        self.record_sink.record_in_background(&self.tasks, entry);
    }
}
