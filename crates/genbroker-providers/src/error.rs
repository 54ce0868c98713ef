//! Provider error types.

use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised while selecting credentials or calling a generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Missing secret or binding. Signals a deployment problem, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{provider} request failed: {message}")]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{0} failed: Image blocked due to safety settings.")]
    SafetyBlock(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Generation did not finish within {0}s. Submit it as a background job (submit_bg_job) instead.")]
    Timeout(u64),

    #[error("Provider operation failed: {0}")]
    OperationFailed(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Build a provider error from a non-success HTTP response.
    pub fn from_http_status(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            status: Some(status),
            message: format!("HTTP {}: {}", status, body.into()),
        }
    }

    /// Check if error is retryable.
    ///
    /// Only transport failures, rate limiting and provider 5xx responses are
    /// transient. Safety blocks and auth failures never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Provider {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Configuration(_) => "configuration",
            ProviderError::Validation(_) => "validation",
            ProviderError::Provider { .. } => "provider",
            ProviderError::SafetyBlock(_) => "safety_block",
            ProviderError::Auth(_) => "auth",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::OperationFailed(_) => "operation_failed",
            ProviderError::Network(_) => "network",
            ProviderError::Json(_) => "json",
        }
    }
}
