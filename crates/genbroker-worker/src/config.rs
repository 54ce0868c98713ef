//! Worker configuration.

use std::time::Duration;

use genbroker_models::DEFAULT_JOB_TTL_SECS;
use genbroker_providers::ProviderConfig;
use genbroker_store::QueueConfig;

/// Headroom between the video polling budget and message reclaim.
const RECLAIM_MARGIN: Duration = Duration::from_secs(60);

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// TTL for Status entries written by this worker
    pub status_ttl_secs: u64,
    /// How long one queue read blocks waiting for messages
    pub consume_block: Duration,
    /// How often the worker scans for orphaned pending messages
    pub claim_interval: Duration,
    /// Maximum messages claimed per scan
    pub claim_batch: usize,
    /// Graceful shutdown timeout for in-flight jobs and record-sink writes
    pub shutdown_timeout: Duration,
    /// Polling budget for long-running video operations. Jobs are off the
    /// request path, so this is far longer than the synchronous budget.
    pub lro_budget: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            status_ttl_secs: DEFAULT_JOB_TTL_SECS,
            consume_block: Duration::from_secs(1),
            claim_interval: Duration::from_secs(30),
            claim_batch: 5,
            shutdown_timeout: Duration::from_secs(60),
            lro_budget: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: parse_env("WORKER_MAX_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            status_ttl_secs: parse_env("STATUS_TTL_SECS")
                .or_else(|| parse_env("JOB_TTL_SECS"))
                .filter(|ttl: &u64| *ttl > 0)
                .unwrap_or(defaults.status_ttl_secs),
            consume_block: parse_env("WORKER_CONSUME_BLOCK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.consume_block),
            claim_interval: parse_env("WORKER_CLAIM_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_interval),
            claim_batch: parse_env("WORKER_CLAIM_BATCH").unwrap_or(defaults.claim_batch),
            shutdown_timeout: parse_env("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            lro_budget: parse_env("WORKER_LRO_BUDGET_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.lro_budget),
        }
    }

    /// Provider settings for the worker: the video poller gets the worker budget.
    pub fn provider_config(&self, mut base: ProviderConfig) -> ProviderConfig {
        base.poll.budget = self.lro_budget;
        base
    }

    /// Queue settings for the worker. A message still being polled must not
    /// look idle enough to be reclaimed by another consumer.
    pub fn queue_config(&self, mut base: QueueConfig) -> QueueConfig {
        base.visibility_timeout = base
            .visibility_timeout
            .max(self.lro_budget + RECLAIM_MARGIN);
        base
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_uses_worker_budget() {
        let config = WorkerConfig::default();
        let provider = config.provider_config(ProviderConfig::default());

        assert_eq!(provider.poll.budget, Duration::from_secs(600));
        assert_eq!(provider.poll.interval, ProviderConfig::default().poll.interval);
    }

    #[test]
    fn test_visibility_timeout_outlasts_polling_budget() {
        let config = WorkerConfig::default();
        let queue = config.queue_config(QueueConfig::default());
        assert_eq!(queue.visibility_timeout, Duration::from_secs(660));

        let generous = QueueConfig {
            visibility_timeout: Duration::from_secs(3600),
            ..Default::default()
        };
        assert_eq!(
            config.queue_config(generous).visibility_timeout,
            Duration::from_secs(3600)
        );
    }
}
