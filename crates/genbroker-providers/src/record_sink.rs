//! Best-effort mirroring of results and errors to an external record sink.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, warn};

use genbroker_models::RecordEntry;

use crate::background::BackgroundTasks;
use crate::error::{ProviderError, ProviderResult};
use crate::metrics::record_request;

/// Append-only audit sink. Disabled when no URL is configured.
pub struct RecordSink {
    http: Client,
    url: Option<String>,
}

impl RecordSink {
    pub fn new(http: Client, url: Option<String>) -> Self {
        Self { http, url }
    }

    pub fn disabled() -> Self {
        Self::new(Client::new(), None)
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// POST one entry. A disabled sink accepts everything.
    pub async fn record(&self, entry: &RecordEntry) -> ProviderResult<()> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let start = std::time::Instant::now();
        let response = self.http.post(url).json(entry).send().await?;
        let status = response.status();
        record_request("record_sink", status.as_u16(), start.elapsed().as_secs_f64() * 1000.0);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status("record_sink", status.as_u16(), body));
        }

        debug!(model = %entry.model_tag, is_error = entry.is_error, "Recorded entry");
        Ok(())
    }

    /// Record `entry` on `tasks`. Failures are logged and swallowed.
    pub fn record_in_background(self: &Arc<Self>, tasks: &BackgroundTasks, entry: RecordEntry) {
        if !self.is_enabled() {
            return;
        }

        let sink = Arc::clone(self);
        tasks.spawn("record_sink", async move {
            if let Err(e) = sink.record(&entry).await {
                warn!(model = %entry.model_tag, "Failed to mirror entry to record sink: {}", e);
            }
        });
    }
}
