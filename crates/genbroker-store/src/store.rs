//! TTL-bounded key-value stores.
//!
//! Contract shared by every backend:
//! - `put` upserts and the value becomes unreachable once its TTL elapses
//! - `get` never returns an expired value
//! - `delete` is idempotent
//! - single-key atomicity only; concurrent writers are last-write-wins

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Key-value store with per-entry expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Upsert `value` under `key`, expiring after `ttl_secs`.
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    /// Read `key`. Expired and missing keys both return `None`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Connectivity check for readiness probes.
    async fn ping(&self) -> StoreResult<()>;
}

/// Store backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Redis { url: String },
    Memory,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

impl StoreConfig {
    /// Create config from environment variables.
    ///
    /// `STORE_BACKEND=memory` selects the in-process store (development only,
    /// nothing is shared between processes).
    pub fn from_env() -> Self {
        let backend = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Redis {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            },
        };
        Self { backend }
    }
}

/// Redis implementation using `SET EX`, `GET` and `DEL`.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        // EX 0 is rejected by Redis
        conn.set_ex::<_, _, ()>(key, value, ttl_secs.max(1)).await?;
        debug!(key = %key, ttl_secs, "Stored key");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process store used by tests and single-process development setups.
///
/// Expiry uses the tokio clock so paused-time tests can advance past a TTL.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_secs.max(1));
        let mut entries = self.entries.write().await;
        // Keys that are never read again would otherwise stay forever
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: purge so it cannot resurface
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
