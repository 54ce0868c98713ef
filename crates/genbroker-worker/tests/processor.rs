//! Job processing against an in-memory store and fake providers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use genbroker_models::{
    CapabilityClass, GenerationParams, GenerationRequest, GenerationResult, Job, JobOutcome,
    ModelKind,
};
use genbroker_providers::providers::GenerationProvider;
use genbroker_providers::{
    poll_until_done, BackgroundTasks, CredentialPool, OperationHandle, OperationSource,
    OperationStatus, PollConfig, ProviderConfig, ProviderError, ProviderRegistry, ProviderResult,
    RecordSink,
};
use genbroker_store::{JobStore, MemoryStore};
use genbroker_worker::{Delivery, JobDisposition, JobProcessor, WorkerConfig};

type Outcome = fn(&GenerationRequest) -> ProviderResult<GenerationResult>;

struct FakeProvider {
    model: ModelKind,
    outcome: Outcome,
    credentials_seen: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn new(model: ModelKind, outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            model,
            outcome,
            credentials_seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> ModelKind {
        self.model
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &str,
    ) -> ProviderResult<GenerationResult> {
        self.credentials_seen.lock().unwrap().push(credential.to_string());
        (self.outcome)(request)
    }
}

fn succeed(request: &GenerationRequest) -> ProviderResult<GenerationResult> {
    Ok(GenerationResult::image("AAAA", request.params.prompt.clone()))
}

fn overloaded(_: &GenerationRequest) -> ProviderResult<GenerationResult> {
    Err(ProviderError::from_http_status("imagen", 503, "overloaded"))
}

fn blocked(_: &GenerationRequest) -> ProviderResult<GenerationResult> {
    Err(ProviderError::SafetyBlock("Generate".into()))
}

/// Operation that reports done once `ready_after` has elapsed.
struct SlowOperation {
    started: tokio::time::Instant,
    ready_after: Duration,
}

#[async_trait]
impl OperationSource for SlowOperation {
    async fn fetch(&self, _name: &str, _bearer_token: &str) -> ProviderResult<OperationStatus> {
        let done = self.started.elapsed() >= self.ready_after;
        Ok(OperationStatus {
            done,
            response: done.then(|| serde_json::json!({ "videos": [] })),
            ..Default::default()
        })
    }
}

/// Video provider whose operation takes `ready_after` to finish.
struct SlowVideoProvider {
    poll: PollConfig,
    ready_after: Duration,
}

#[async_trait]
impl GenerationProvider for SlowVideoProvider {
    fn name(&self) -> &'static str {
        "slow-video"
    }

    fn model(&self) -> ModelKind {
        ModelKind::Veo
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &str,
    ) -> ProviderResult<GenerationResult> {
        let source = SlowOperation {
            started: tokio::time::Instant::now(),
            ready_after: self.ready_after,
        };
        let handle = OperationHandle::new("operations/slow", credential, self.poll.budget);
        poll_until_done(&source, &handle, self.poll.interval).await?;
        Ok(GenerationResult {
            storage_ref: Some("gs://bucket/video.mp4".into()),
            translated_prompt: request.params.prompt.clone(),
            ..Default::default()
        })
    }
}

fn pool() -> Arc<CredentialPool> {
    let mut pool = CredentialPool::new();
    for class in CapabilityClass::all() {
        for slot in 0..10 {
            pool = pool.with_secret(class, slot, format!("key-{}", slot));
        }
    }
    Arc::new(pool)
}

fn processor(provider: Arc<dyn GenerationProvider>, sink: RecordSink) -> (JobProcessor, JobStore) {
    let jobs = JobStore::new(Arc::new(MemoryStore::new()));
    let processor = JobProcessor::new(
        jobs.clone(),
        ProviderRegistry::new().with_provider(provider),
        pool(),
        Arc::new(sink),
        BackgroundTasks::new(),
        60,
    );
    (processor, jobs)
}

async fn submitted(jobs: &JobStore, rotation_index: u64) -> Job {
    let job = Job::new(ModelKind::Imagen, GenerationParams::new("cat"), rotation_index, 60);
    jobs.put_job(&job).await.unwrap();
    job
}

#[tokio::test]
async fn completed_job_writes_one_status_and_discards_the_job() {
    let provider = FakeProvider::new(ModelKind::Imagen, succeed);
    let (processor, jobs) = processor(provider.clone(), RecordSink::disabled());
    let job = submitted(&jobs, 4).await;

    let disposition = processor.process(&job.id, Delivery::first()).await.unwrap();
    assert_eq!(disposition, JobDisposition::Completed);

    let status = jobs.take_status(&job.id).await.unwrap().unwrap();
    assert_eq!(
        status.outcome,
        JobOutcome::Complete {
            result: GenerationResult::image("AAAA", "cat")
        }
    );
    assert!(jobs.get_job(&job.id).await.unwrap().is_none());
    assert_eq!(*provider.credentials_seen.lock().unwrap(), vec!["key-4".to_string()]);
}

#[tokio::test]
async fn transient_failure_writes_nothing_until_last_delivery() {
    let provider = FakeProvider::new(ModelKind::Imagen, overloaded);
    let (processor, jobs) = processor(provider.clone(), RecordSink::disabled());
    let job = submitted(&jobs, 0).await;

    let disposition = processor.process(&job.id, Delivery::new(0, 3)).await.unwrap();
    assert!(matches!(disposition, JobDisposition::Retry(_)));
    assert!(jobs.get_status(&job.id).await.unwrap().is_none());

    let disposition = processor.process(&job.id, Delivery::new(2, 3)).await.unwrap();
    assert!(matches!(disposition, JobDisposition::Exhausted(_)));

    let status = jobs.take_status(&job.id).await.unwrap().unwrap();
    assert!(!status.is_complete());

    // Each delivery moved to the next credential
    assert_eq!(
        *provider.credentials_seen.lock().unwrap(),
        vec!["key-0".to_string(), "key-2".to_string()]
    );
}

#[tokio::test]
async fn safety_block_fails_immediately() {
    let provider = FakeProvider::new(ModelKind::Imagen, blocked);
    let (processor, jobs) = processor(provider, RecordSink::disabled());
    let job = submitted(&jobs, 0).await;

    let disposition = processor.process(&job.id, Delivery::first()).await.unwrap();
    assert_eq!(disposition, JobDisposition::Failed);

    let status = jobs.take_status(&job.id).await.unwrap().unwrap();
    assert_eq!(
        status.outcome,
        JobOutcome::Error {
            error_message: "Generate failed: Image blocked due to safety settings.".into()
        }
    );
}

#[tokio::test]
async fn missing_provider_is_a_terminal_error() {
    let provider = FakeProvider::new(ModelKind::Veo, succeed);
    let (processor, jobs) = processor(provider, RecordSink::disabled());
    let job = submitted(&jobs, 0).await;

    let disposition = processor.process(&job.id, Delivery::first()).await.unwrap();
    assert_eq!(disposition, JobDisposition::Failed);
    assert!(jobs.take_status(&job.id).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn expired_job_is_skipped() {
    let provider = FakeProvider::new(ModelKind::Imagen, succeed);
    let (processor, jobs) = processor(provider.clone(), RecordSink::disabled());
    let job = submitted(&jobs, 0).await;

    tokio::time::advance(Duration::from_secs(61)).await;

    let disposition = processor.process(&job.id, Delivery::first()).await.unwrap();
    assert_eq!(disposition, JobDisposition::Missing);
    assert!(jobs.get_status(&job.id).await.unwrap().is_none());
    assert!(provider.credentials_seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn results_are_mirrored_to_the_record_sink() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records"))
        .and(body_partial_json(serde_json::json!({
            "prompt": "cat",
            "modelTag": "imagen-3.0-generate",
            "payload": "AAAA",
            "isError": false
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sink = RecordSink::new(reqwest::Client::new(), Some(format!("{}/records", server.uri())));
    let provider = FakeProvider::new(ModelKind::Imagen, succeed);
    let (processor, jobs) = processor(provider, sink);
    let job = submitted(&jobs, 0).await;

    let disposition = tokio_test::assert_ok!(processor.process(&job.id, Delivery::first()).await);
    assert_eq!(disposition, JobDisposition::Completed);

    let aborted = processor.tasks().drain(Duration::from_secs(5)).await;
    assert_eq!(aborted, 0);
}

#[tokio::test(start_paused = true)]
async fn video_job_may_outlast_the_synchronous_budget() {
    let ready_after = Duration::from_secs(90);

    let sync_poll = ProviderConfig::default().poll;
    assert!(sync_poll.budget < ready_after);
    let sync_provider = Arc::new(SlowVideoProvider {
        poll: sync_poll,
        ready_after,
    });
    let (sync_processor, jobs) = processor(sync_provider, RecordSink::disabled());
    let job = Job::new(ModelKind::Veo, GenerationParams::new("a wave"), 0, 3600);
    jobs.put_job(&job).await.unwrap();
    let disposition = sync_processor.process(&job.id, Delivery::first()).await.unwrap();
    assert_eq!(disposition, JobDisposition::Failed);

    let worker_poll = WorkerConfig::default()
        .provider_config(ProviderConfig::default())
        .poll;
    let worker_provider = Arc::new(SlowVideoProvider {
        poll: worker_poll,
        ready_after,
    });
    let (worker_processor, jobs) = processor(worker_provider, RecordSink::disabled());
    let job = Job::new(ModelKind::Veo, GenerationParams::new("a wave"), 0, 3600);
    jobs.put_job(&job).await.unwrap();

    let disposition = worker_processor.process(&job.id, Delivery::first()).await.unwrap();
    assert_eq!(disposition, JobDisposition::Completed);

    let status = jobs.take_status(&job.id).await.unwrap().unwrap();
    match status.outcome {
        JobOutcome::Complete { result } => {
            assert_eq!(result.storage_ref.as_deref(), Some("gs://bucket/video.mp4"))
        }
        other => panic!("expected complete status, got {:?}", other),
    }
}
