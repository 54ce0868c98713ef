//! Durable job/status store and job queue.
//!
//! This crate provides:
//! - A TTL-bounded key-value store trait with Redis and in-memory backends
//! - The typed Job/Status mailbox used by the dispatcher, worker and poller
//! - An optional Redis Streams queue for push-style job delivery

pub mod error;
pub mod jobs;
pub mod queue;
pub mod store;

use std::sync::Arc;

pub use error::{QueueError, QueueResult, StoreError, StoreResult};
pub use jobs::JobStore;
pub use queue::{JobQueue, QueueConfig, QueueMessage};
pub use store::{KeyValueStore, MemoryStore, RedisStore, StoreBackend, StoreConfig};

/// Build the configured key-value backend.
pub fn connect(config: &StoreConfig) -> StoreResult<Arc<dyn KeyValueStore>> {
    match &config.backend {
        StoreBackend::Redis { url } => Ok(Arc::new(RedisStore::new(url)?)),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; job state is not shared between processes");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
