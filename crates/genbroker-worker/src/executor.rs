//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use genbroker_store::{JobQueue, QueueMessage};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::processor::{Delivery, JobDisposition, JobProcessor};
use crate::retry::FailureTracker;

/// Consumes queued job ids and runs them through the [`JobProcessor`].
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    processor: Arc<JobProcessor>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, processor: JobProcessor) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            processor: Arc::new(processor),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is signalled, then wait for
    /// in-flight jobs and drain record-sink writes.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        self.queue.init().await?;

        let claim_task = self.spawn_claimer();
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut failures = FailureTracker::new(5);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    match result {
                        Ok(()) => failures.record_success(),
                        Err(e) => {
                            if failures.record_failure() {
                                error!("Error consuming jobs: {}", e);
                            }
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete");
        let all_permits = self.config.max_concurrent_jobs as u32;
        if tokio::time::timeout(
            self.config.shutdown_timeout,
            self.job_semaphore.acquire_many(all_permits),
        )
        .await
        .is_err()
        {
            warn!("In-flight jobs still running at shutdown timeout");
        }

        let aborted = self.processor.tasks().drain(self.config.shutdown_timeout).await;
        if aborted > 0 {
            warn!(aborted, "Record-sink writes cancelled at shutdown");
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Periodically claim messages orphaned by crashed workers or parked for retry.
    fn spawn_claimer(&self) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let processor = Arc::clone(&self.processor);
        let semaphore = Arc::clone(&self.job_semaphore);
        let consumer_name = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval;
        let claim_batch = self.config.claim_batch;
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue.claim_pending(&consumer_name, claim_batch).await {
                            Ok(messages) if !messages.is_empty() => {
                                info!("Claimed {} pending jobs", messages.len());
                                for (message_id, message) in messages {
                                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                                        return;
                                    };
                                    let queue = Arc::clone(&queue);
                                    let processor = Arc::clone(&processor);
                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_message(processor, queue, message_id, message).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to claim pending jobs: {}", e),
                        }
                    }
                }
            }
        })
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let messages = self
            .queue
            .consume(
                &self.consumer_name,
                self.config.consume_block.as_millis() as u64,
                available.min(5),
            )
            .await?;

        if messages.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", messages.len());

        for (message_id, message) in messages {
            let processor = Arc::clone(&self.processor);
            let queue = Arc::clone(&self.queue);
            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_message(processor, queue, message_id, message).await;
            });
        }

        Ok(())
    }

    /// Execute one message with retry and DLQ handling.
    async fn execute_message(
        processor: Arc<JobProcessor>,
        queue: Arc<JobQueue>,
        message_id: String,
        message: QueueMessage,
    ) {
        let job_id = message.job_id.clone();
        let attempt = match queue.retry_count(&message_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!(job_id = %job_id, "Failed to read retry count: {}", e);
                0
            }
        };
        let delivery = Delivery::new(attempt, queue.max_retries());

        let disposition = processor.process(&job_id, delivery).await;

        let result = match disposition {
            Ok(JobDisposition::Completed | JobDisposition::Failed | JobDisposition::Missing) => {
                queue.ack(&message_id).await
            }
            Ok(JobDisposition::Exhausted(reason)) => {
                metrics::record_dead_lettered();
                queue.dlq(&message_id, &message, &reason).await
            }
            Ok(JobDisposition::Retry(reason)) => {
                Self::park_for_retry(&queue, &message_id, &message, &reason).await
            }
            Err(e) => {
                error!(job_id = %job_id, "Job processing failed: {}", e);
                Self::park_for_retry(&queue, &message_id, &message, &e.to_string()).await
            }
        };

        if let Err(e) = result {
            error!(job_id = %job_id, "Failed to settle queue message: {}", e);
        }
    }

    /// Leave the message pending for reclaim, or dead-letter it once the
    /// retry budget is spent.
    async fn park_for_retry(
        queue: &JobQueue,
        message_id: &str,
        message: &QueueMessage,
        reason: &str,
    ) -> Result<(), genbroker_store::QueueError> {
        let retry_count = queue.increment_retry(message_id).await?;
        let max_retries = queue.max_retries();

        if retry_count >= max_retries {
            warn!(job_id = %message.job_id, max_retries, "Job exceeded max retries, moving to DLQ");
            metrics::record_dead_lettered();
            queue.dlq(message_id, message, reason).await
        } else {
            info!(job_id = %message.job_id, retry_count, max_retries, "Job will be retried");
            metrics::record_redelivery();
            Ok(())
        }
    }
}
