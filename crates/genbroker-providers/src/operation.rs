//! Long-running operation polling.
//!
//! The poller sleeps one interval, queries, and repeats with a fixed interval
//! until the operation reports `done` or another poll would overrun the
//! budget. The handle never outlives the request that created it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::metrics::{record_lro_poll, record_request};

/// Polling budget and interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub budget: Duration,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(45),
            interval: Duration::from_secs(3),
        }
    }
}

impl PollConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let budget_secs: u64 = std::env::var("LRO_BUDGET_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.budget.as_secs());
        let interval_secs: u64 = std::env::var("LRO_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s| *s > 0)
            .unwrap_or(defaults.interval.as_secs());

        Self {
            budget: Duration::from_secs(budget_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }
}

/// A provider-issued operation being polled within one request.
#[derive(Clone)]
pub struct OperationHandle {
    pub name: String,
    pub bearer_token: String,
    pub created_at: Instant,
    pub deadline: Instant,
}

impl OperationHandle {
    pub fn new(name: impl Into<String>, bearer_token: impl Into<String>, budget: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            name: name.into(),
            bearer_token: bearer_token.into(),
            created_at,
            deadline: created_at + budget,
        }
    }

    fn budget(&self) -> Duration {
        self.deadline - self.created_at
    }
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("name", &self.name)
            .field("budget", &self.budget())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Operation state as reported by the provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<Value>,
}

/// Where operation status comes from.
#[async_trait]
pub trait OperationSource: Send + Sync {
    async fn fetch(&self, name: &str, bearer_token: &str) -> ProviderResult<OperationStatus>;
}

/// Poll `handle` until it completes.
///
/// Returns the operation's `response` body. A finished operation carrying an
/// error yields [`ProviderError::OperationFailed`]. When another interval
/// would pass the deadline, yields [`ProviderError::Timeout`] without polling
/// again.
pub async fn poll_until_done(
    source: &dyn OperationSource,
    handle: &OperationHandle,
    interval: Duration,
) -> ProviderResult<Value> {
    let mut polls: u32 = 0;

    loop {
        tokio::time::sleep(interval).await;
        polls += 1;
        record_lro_poll();

        let status = source.fetch(&handle.name, &handle.bearer_token).await?;

        if status.done {
            if let Some(error) = status.error {
                warn!(operation = %handle.name, code = ?error.code, "Operation failed: {}", error.message);
                return Err(ProviderError::OperationFailed(error.message));
            }
            debug!(operation = %handle.name, polls, "Operation finished");
            return status
                .response
                .ok_or_else(|| ProviderError::provider("operation", "Operation finished without a response"));
        }

        if Instant::now() + interval > handle.deadline {
            warn!(
                operation = %handle.name,
                polls,
                budget_secs = handle.budget().as_secs(),
                "Operation did not finish within budget"
            );
            return Err(ProviderError::Timeout(handle.budget().as_secs()));
        }

        debug!(operation = %handle.name, polls, "Operation still running");
    }
}

/// Vertex `fetchPredictOperation` endpoint.
pub struct HttpOperationSource {
    http: Client,
    /// Model resource URL; `:fetchPredictOperation` is appended
    model_url: String,
}

impl HttpOperationSource {
    pub fn new(http: Client, model_url: impl Into<String>) -> Self {
        Self {
            http,
            model_url: model_url.into(),
        }
    }
}

#[async_trait]
impl OperationSource for HttpOperationSource {
    async fn fetch(&self, name: &str, bearer_token: &str) -> ProviderResult<OperationStatus> {
        let start = std::time::Instant::now();
        let response = self
            .http
            .post(format!("{}:fetchPredictOperation", self.model_url))
            .bearer_auth(bearer_token)
            .json(&serde_json::json!({ "operationName": name }))
            .send()
            .await?;

        let status = response.status();
        record_request("veo_fetch_operation", status.as_u16(), start.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status("veo", status.as_u16(), body));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reports `done=false` for the first `pending_polls` queries.
    struct ScriptedSource {
        pending_polls: u32,
        calls: AtomicU32,
        fail_with: Option<String>,
    }

    impl ScriptedSource {
        fn new(pending_polls: u32) -> Self {
            Self {
                pending_polls,
                calls: AtomicU32::new(0),
                fail_with: None,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OperationSource for ScriptedSource {
        async fn fetch(&self, name: &str, bearer_token: &str) -> ProviderResult<OperationStatus> {
            assert_eq!(bearer_token, "token");
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.pending_polls {
                return Ok(OperationStatus {
                    name: Some(name.to_string()),
                    ..Default::default()
                });
            }
            Ok(OperationStatus {
                name: Some(name.to_string()),
                done: true,
                error: self.fail_with.clone().map(|message| OperationError {
                    code: Some(3),
                    message,
                }),
                response: Some(serde_json::json!({ "videos": [{ "gcsUri": "gs://b/v.mp4" }] })),
            })
        }
    }

    fn handle() -> OperationHandle {
        OperationHandle::new("projects/p/operations/op-1", "token", Duration::from_secs(45))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_after_n_plus_one_queries() {
        let source = ScriptedSource::new(4);
        let result = poll_until_done(&source, &handle(), Duration::from_secs(3))
            .await
            .unwrap();

        assert_eq!(source.calls(), 5);
        assert_eq!(result["videos"][0]["gcsUri"], "gs://b/v.mp4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_on_first_query() {
        let source = ScriptedSource::new(0);
        let start = Instant::now();
        poll_until_done(&source, &handle(), Duration::from_secs(3))
            .await
            .unwrap();

        assert_eq!(source.calls(), 1);
        // Sleeps before the first query
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_completing_operation_times_out_at_budget() {
        let source = ScriptedSource::new(u32::MAX);
        let start = Instant::now();
        let err = poll_until_done(&source, &handle(), Duration::from_secs(3))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout(45)));
        assert_eq!(source.calls(), 15);
        assert_eq!(start.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_is_surfaced() {
        let mut source = ScriptedSource::new(1);
        source.fail_with = Some("prompt rejected".into());

        let err = poll_until_done(&source, &handle(), Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::OperationFailed(ref m) if m == "prompt rejected"));
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_status_parses_provider_shape() {
        let status: OperationStatus = serde_json::from_str(
            r#"{"name":"op","done":true,"error":{"code":3,"message":"bad"}}"#,
        )
        .unwrap();
        assert!(status.done);
        assert_eq!(status.error.unwrap().message, "bad");

        let running: OperationStatus = serde_json::from_str(r#"{"name":"op"}"#).unwrap();
        assert!(!running.done);
    }
}
