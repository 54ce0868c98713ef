//! Generation worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use genbroker_providers::{
    BackgroundTasks, CredentialPool, ProviderConfig, ProviderRegistry, RecordSink,
};
use genbroker_store::{JobQueue, JobStore, QueueConfig, StoreConfig};
use genbroker_worker::{JobExecutor, JobProcessor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting genbroker-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = metrics_addr()? {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to start metrics exporter")?;
        info!("Prometheus metrics listening on {}", addr);
    }

    let jobs = JobStore::new(genbroker_store::connect(&StoreConfig::from_env())?);
    let queue = JobQueue::new(config.queue_config(QueueConfig::from_env()))
        .context("Failed to create job queue")?;

    let provider_config = config.provider_config(ProviderConfig::from_env());
    let http = provider_config.http_client()?;
    let processor = JobProcessor::new(
        jobs,
        ProviderRegistry::from_config(&provider_config, http.clone()),
        Arc::new(CredentialPool::from_env()),
        Arc::new(RecordSink::new(http, provider_config.record_sink_url.clone())),
        BackgroundTasks::new(),
        config.status_ttl_secs,
    );

    let executor = Arc::new(JobExecutor::new(config, queue, processor));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_executor.shutdown();
    });

    executor.run().await?;

    info!("Worker shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("genbroker=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// `WORKER_METRICS_PORT` enables the Prometheus listener.
fn metrics_addr() -> anyhow::Result<Option<SocketAddr>> {
    let Ok(port) = std::env::var("WORKER_METRICS_PORT") else {
        return Ok(None);
    };
    let port: u16 = port.parse().context("Invalid WORKER_METRICS_PORT")?;
    Ok(Some(SocketAddr::from(([0, 0, 0, 0], port))))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}
