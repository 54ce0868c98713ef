//! Predict-style image generation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, info_span, Instrument};

use genbroker_models::{GenerationMode, GenerationRequest, GenerationResult, ModelKind};

use super::gemini::API_KEY_HEADER;
use super::{send_json, GenerationProvider};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};

/// Predict-endpoint safety categories, all relaxed to `BLOCK_NONE`.
const SAFETY_CATEGORIES: [&str; 4] = ["violence", "sexual", "hate", "dangerous"];

fn relaxed_safety_settings() -> serde_json::Map<String, serde_json::Value> {
    SAFETY_CATEGORIES
        .into_iter()
        .map(|category| (category.to_string(), serde_json::Value::from("BLOCK_NONE")))
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

pub struct ImagenProvider {
    http: Client,
    endpoint: String,
}

impl ImagenProvider {
    pub fn new(http: Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            endpoint: format!(
                "{}/models/{}:predict",
                config.api_base_url.trim_end_matches('/'),
                config.imagen_model
            ),
        }
    }
}

#[async_trait]
impl GenerationProvider for ImagenProvider {
    fn name(&self) -> &'static str {
        "imagen"
    }

    fn model(&self) -> ModelKind {
        ModelKind::Imagen
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &str,
    ) -> ProviderResult<GenerationResult> {
        if request.mode == GenerationMode::Edit {
            return Err(ProviderError::validation(format!(
                "Model {} does not support editing",
                self.model()
            )));
        }

        let prompt = request.params.enhanced_prompt();
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "safetySettings": relaxed_safety_settings()
            }
        });

        let span = info_span!("imagen_predict");
        let response: PredictResponse = send_json(
            self.name(),
            self.http
                .post(&self.endpoint)
                .header(API_KEY_HEADER, credential)
                .json(&body),
        )
        .instrument(span)
        .await?;

        let prediction = response.predictions.into_iter().next();
        match prediction {
            Some(Prediction {
                bytes_base64_encoded: Some(data),
                mime_type,
                ..
            }) => {
                info!(bytes = data.len(), "Imagen returned an image");
                Ok(GenerationResult {
                    base64: Some(data),
                    mime_type: mime_type.or_else(|| Some("image/png".to_string())),
                    translated_prompt: prompt,
                    ..Default::default()
                })
            }
            Some(Prediction {
                rai_filtered_reason: Some(reason),
                ..
            }) => {
                info!(reason = %reason, "Imagen filtered the prompt");
                Err(ProviderError::SafetyBlock("Generate".to_string()))
            }
            // An empty prediction list is how the API reports a filtered prompt
            None => Err(ProviderError::SafetyBlock("Generate".to_string())),
            Some(_) => Err(ProviderError::provider(self.name(), "No image data in response")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genbroker_models::GenerationParams;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer) -> ImagenProvider {
        let config = ProviderConfig {
            api_base_url: server.uri(),
            ..Default::default()
        };
        ImagenProvider::new(Client::new(), &config)
    }

    #[tokio::test]
    async fn test_generate_returns_first_prediction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/imagen-3.0-generate-002:predict"))
            .and(header("x-goog-api-key", "key-3"))
            .and(body_partial_json(serde_json::json!({
                "instances": [{ "prompt": "a cat, watercolor style" }],
                "parameters": {
                    "sampleCount": 1,
                    "safetySettings": {
                        "violence": "BLOCK_NONE",
                        "sexual": "BLOCK_NONE",
                        "hate": "BLOCK_NONE",
                        "dangerous": "BLOCK_NONE"
                    }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "predictions": [{ "bytesBase64Encoded": "AAAA", "mimeType": "image/png" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut params = GenerationParams::new("a cat");
        params.styles = vec!["watercolor".into()];
        let request = GenerationRequest::generate(ModelKind::Imagen, params);

        let result = provider(&server).await.generate(&request, "key-3").await.unwrap();
        assert_eq!(result.base64.as_deref(), Some("AAAA"));
        assert_eq!(result.translated_prompt, "a cat, watercolor style");
    }

    #[tokio::test]
    async fn test_empty_predictions_is_safety_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let request = GenerationRequest::generate(ModelKind::Imagen, GenerationParams::new("x"));
        let err = provider(&server).await.generate(&request, "k").await.unwrap_err();
        assert!(matches!(err, ProviderError::SafetyBlock(_)));
    }

    #[tokio::test]
    async fn test_quota_error_is_retryable_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let request = GenerationRequest::generate(ModelKind::Imagen, GenerationParams::new("x"));
        let err = provider(&server).await.generate(&request, "k").await.unwrap_err();
        assert!(matches!(err, ProviderError::Provider { status: Some(429), .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_edit_is_rejected_without_network_call() {
        let server = MockServer::start().await;
        let request = GenerationRequest::edit(ModelKind::Imagen, GenerationParams::new("x"));
        let err = provider(&server).await.generate(&request, "k").await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
