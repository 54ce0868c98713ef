//! Application state.

use std::sync::Arc;

use tracing::info;

use genbroker_providers::{
    BackgroundTasks, CredentialPool, ProviderConfig, ProviderRegistry, RecordSink, TranslateClient,
};
use genbroker_store::{JobQueue, JobStore, StoreConfig};

use crate::auth::PasswordVerifier;
use crate::config::ApiConfig;
use crate::dispatch::Dispatcher;
use crate::middleware::ClientRateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub password: Arc<PasswordVerifier>,
    pub queue: Option<Arc<JobQueue>>,
    pub rate_limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let store_config = StoreConfig::from_env();
        let jobs = JobStore::new(genbroker_store::connect(&store_config)?);

        let provider_config = ProviderConfig::from_env();
        let http = provider_config.http_client()?;

        let pool = Arc::new(CredentialPool::from_env());
        let registry = ProviderRegistry::from_config(&provider_config, http.clone());
        let translator = Arc::new(TranslateClient::new(http.clone(), &provider_config));
        let record_sink = Arc::new(RecordSink::new(http, provider_config.record_sink_url.clone()));

        let mut dispatcher = Dispatcher::new(
            pool,
            registry,
            translator,
            jobs,
            record_sink,
            BackgroundTasks::new(),
        )
        .with_job_ttl(config.job_ttl_secs);

        let queue = if config.queue_enabled {
            let queue = Arc::new(JobQueue::from_env()?);
            queue.init().await?;
            dispatcher = dispatcher.with_queue(Arc::clone(&queue));
            info!("Job queue enabled");
            Some(queue)
        } else {
            None
        };

        let password = Arc::new(PasswordVerifier::new(config.master_password.as_deref()));
        let rate_limiter = Arc::new(ClientRateLimiter::new(
            config.rate_limit_rps,
            config.rate_limit_burst,
        ));

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            password,
            queue,
            rate_limiter,
        })
    }

    /// Assemble state from pre-built parts.
    pub fn from_parts(config: ApiConfig, dispatcher: Dispatcher) -> Self {
        let password = Arc::new(PasswordVerifier::new(config.master_password.as_deref()));
        let rate_limiter = Arc::new(ClientRateLimiter::new(
            config.rate_limit_rps,
            config.rate_limit_burst,
        ));
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            password,
            queue: None,
            rate_limiter,
        }
    }

    pub fn jobs(&self) -> &JobStore {
        self.dispatcher.jobs()
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        self.dispatcher.tasks()
    }
}
