//! Provider configuration.
//!
//! Built once at startup and shared by every adapter. Nothing in this crate
//! reads provider URLs from globals.

use std::time::Duration;

use reqwest::Client;

use crate::error::{ProviderError, ProviderResult};
use crate::operation::PollConfig;

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_TOKEN_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Vertex AI settings for the video provider.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// API root, e.g. `https://us-central1-aiplatform.googleapis.com/v1`
    pub base_url: String,
    pub project_id: String,
    pub location: String,
    pub model: String,
    /// Optional `gs://` prefix the provider writes videos under
    pub storage_uri: Option<String>,
}

impl VertexConfig {
    /// Model resource URL, without the `:method` suffix.
    pub fn model_url(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.location,
            self.model
        )
    }
}

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Generative Language API root
    pub api_base_url: String,
    pub translate_model: String,
    pub imagen_model: String,
    pub flash_image_model: String,
    pub vertex: VertexConfig,
    /// OAuth2 token endpoint, also the assertion audience
    pub token_endpoint: String,
    pub token_scope: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Video operation polling budget
    pub poll: PollConfig,
    /// Record sink URL; disabled when unset
    pub record_sink_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let location = "us-central1".to_string();
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            translate_model: "gemini-2.5-flash-preview-09-2025".to_string(),
            imagen_model: "imagen-3.0-generate-002".to_string(),
            flash_image_model: "gemini-2.5-flash-image-preview".to_string(),
            vertex: VertexConfig {
                base_url: format!("https://{}-aiplatform.googleapis.com/v1", location),
                project_id: String::new(),
                location,
                model: "veo-3.0-generate-001".to_string(),
                storage_uri: None,
            },
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            token_scope: DEFAULT_TOKEN_SCOPE.to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            poll: PollConfig::default(),
            record_sink_url: None,
        }
    }
}

impl ProviderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let location = env_or("VERTEX_LOCATION", &defaults.vertex.location);
        let vertex_base_url = std::env::var("VERTEX_API_BASE_URL")
            .unwrap_or_else(|_| format!("https://{}-aiplatform.googleapis.com/v1", location));

        let request_timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.request_timeout.as_secs());

        Self {
            api_base_url: env_or("GEMINI_API_BASE_URL", &defaults.api_base_url),
            translate_model: env_or("TRANSLATE_MODEL", &defaults.translate_model),
            imagen_model: env_or("IMAGEN_MODEL", &defaults.imagen_model),
            flash_image_model: env_or("FLASH_IMAGE_MODEL", &defaults.flash_image_model),
            vertex: VertexConfig {
                base_url: vertex_base_url,
                project_id: env_or("VERTEX_PROJECT_ID", ""),
                location,
                model: env_or("VERTEX_VIDEO_MODEL", &defaults.vertex.model),
                storage_uri: non_empty_env("VERTEX_STORAGE_URI"),
            },
            token_endpoint: env_or("OAUTH_TOKEN_ENDPOINT", &defaults.token_endpoint),
            token_scope: env_or("OAUTH_TOKEN_SCOPE", &defaults.token_scope),
            request_timeout: Duration::from_secs(request_timeout_secs),
            connect_timeout: defaults.connect_timeout,
            poll: PollConfig::from_env(),
            record_sink_url: non_empty_env("RECORD_SINK_URL"),
        }
    }

    /// Shared HTTP client for every provider call.
    pub fn http_client(&self) -> ProviderResult<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("genbroker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProviderError::Network)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
