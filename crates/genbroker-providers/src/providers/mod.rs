//! Generation provider adapters.
//!
//! One implementation per provider family, selected through
//! [`ProviderRegistry`](crate::ProviderRegistry) by a validated [`ModelKind`].

mod flash_image;
mod gemini;
mod imagen;
mod translate;
mod veo;

pub use flash_image::FlashImageProvider;
pub use imagen::ImagenProvider;
pub use translate::{TranslateClient, TRANSLATE_SYSTEM_PROMPT};
pub use veo::VeoProvider;

use std::time::Instant;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use genbroker_models::{GenerationRequest, GenerationResult, ModelKind};

use crate::error::{ProviderError, ProviderResult};
use crate::metrics::record_request;

/// A provider family able to serve one [`ModelKind`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the name of this provider for logging and metrics.
    fn name(&self) -> &'static str;

    /// The model this provider serves.
    fn model(&self) -> ModelKind;

    /// Run one generation with the credential selected for this request.
    ///
    /// `credential` is an API key for image providers and a service-account
    /// document for the video provider.
    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &str,
    ) -> ProviderResult<GenerationResult>;
}

/// Send a provider request and decode a JSON body.
///
/// Non-success statuses become [`ProviderError::Provider`] carrying the status
/// so callers can tell transient failures apart.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> ProviderResult<T> {
    let start = Instant::now();
    let response = request.send().await?;
    let status = response.status();
    record_request(provider, status.as_u16(), start.elapsed().as_secs_f64() * 1000.0);

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_http_status(provider, status.as_u16(), body));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::provider(provider, format!("Invalid response body: {}", e)))
}
