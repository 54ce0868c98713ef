//! API error types.
//!
//! Every handler returns [`ApiResult`]; this is the only place errors are
//! turned into the wire format.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use genbroker_models::UnknownModel;
use genbroker_providers::ProviderError;
use genbroker_store::{QueueError, StoreError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    SafetyBlock(String),

    #[error("Authentication with provider failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Timeout(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::SafetyBlock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Provider(_) | ApiError::Auth(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Configuration(_) | ApiError::Store(_) | ApiError::Queue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Configuration(_) => "configuration_error",
            ApiError::Provider(_) => "provider_error",
            ApiError::SafetyBlock(_) => "safety_block",
            ApiError::Auth(_) => "auth_error",
            ApiError::Timeout(_) => "timeout",
            ApiError::Store(_) | ApiError::Queue(_) => "store_error",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::Configuration(_) | ApiError::Store(_) | ApiError::Queue(_)
        )
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Configuration(msg) => ApiError::Configuration(msg),
            ProviderError::Validation(msg) => ApiError::Validation(msg),
            ProviderError::Auth(msg) => ApiError::Auth(msg),
            e @ ProviderError::SafetyBlock(_) => ApiError::SafetyBlock(e.to_string()),
            e @ ProviderError::Timeout(_) => ApiError::Timeout(e.to_string()),
            e => ApiError::Provider(e.to_string()),
        }
    }
}

impl From<UnknownModel> for ApiError {
    fn from(err: UnknownModel) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Length-limit failures surface as a buffering rejection
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::Validation(rejection.body_text())
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            error!(code = self.code(), "Request failed: {}", self);
        }

        // Don't expose internal error details in production
        let message = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_map_to_wire_status() {
        let cases = [
            (ProviderError::configuration("Missing API key (GEMINI_API_KEY_01)"), StatusCode::INTERNAL_SERVER_ERROR),
            (ProviderError::validation("baseImage is required"), StatusCode::BAD_REQUEST),
            (ProviderError::SafetyBlock("Generate".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ProviderError::auth("invalid_grant"), StatusCode::BAD_GATEWAY),
            (ProviderError::Timeout(45), StatusCode::GATEWAY_TIMEOUT),
            (ProviderError::from_http_status("imagen", 500, "boom"), StatusCode::BAD_GATEWAY),
            (ProviderError::OperationFailed("bad".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_safety_block_keeps_user_facing_message() {
        let err = ApiError::from(ProviderError::SafetyBlock("Edit".into()));
        assert_eq!(err.to_string(), "Edit failed: Image blocked due to safety settings.");
        assert_eq!(err.code(), "safety_block");
    }

    #[test]
    fn test_unknown_model_is_validation() {
        let err = ApiError::from(UnknownModel("dall-e".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
