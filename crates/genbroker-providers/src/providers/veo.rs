//! Video generation through a long-running operation.
//!
//! Each call mints a bearer token from the service-account credential,
//! starts a `predictLongRunning` operation and polls it within the
//! configured budget.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, info_span, warn, Instrument};

use genbroker_models::{GenerationMode, GenerationRequest, GenerationResult, ModelKind};

use super::{send_json, GenerationProvider};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::identity::{ServiceAccountKey, TokenMinter};
use crate::operation::{poll_until_done, HttpOperationSource, OperationHandle, PollConfig};

#[derive(Debug, Deserialize)]
struct StartedOperation {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default)]
    videos: Vec<Video>,
    #[serde(default)]
    rai_media_filtered_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Video {
    #[serde(default)]
    gcs_uri: Option<String>,
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

pub struct VeoProvider {
    http: Client,
    minter: TokenMinter,
    model_url: String,
    project_id: String,
    storage_uri: Option<String>,
    poll: PollConfig,
}

impl VeoProvider {
    pub fn new(http: Client, config: &ProviderConfig) -> Self {
        Self {
            minter: TokenMinter::new(
                http.clone(),
                config.token_endpoint.clone(),
                config.token_scope.clone(),
            ),
            http,
            model_url: config.vertex.model_url(),
            project_id: config.vertex.project_id.trim().to_string(),
            storage_uri: config.vertex.storage_uri.clone(),
            poll: config.poll,
        }
    }

    fn request_body(&self, request: &GenerationRequest, prompt: &str) -> serde_json::Value {
        let mut parameters = serde_json::json!({ "sampleCount": 1 });
        if let Some(ratio) = &request.params.aspect_ratio {
            parameters["aspectRatio"] = ratio.clone().into();
        }
        if let Some(uri) = &self.storage_uri {
            parameters["storageUri"] = uri.clone().into();
        }
        serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": parameters
        })
    }
}

#[async_trait]
impl GenerationProvider for VeoProvider {
    fn name(&self) -> &'static str {
        "veo"
    }

    fn model(&self) -> ModelKind {
        ModelKind::Veo
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

        if self.project_id.is_empty() {
            return Err(ProviderError::configuration(
                "Missing Vertex project id (VERTEX_PROJECT_ID)",
            ));
        }

        let key = ServiceAccountKey::from_json(credential)?;
        let token = self.minter.mint(&key).await?;
        let prompt = request.params.enhanced_prompt();

        let started: StartedOperation = send_json(
            self.name(),
            self.http
                .post(format!("{}:predictLongRunning", self.model_url))
                .bearer_auth(&token.access_token)
                .json(&self.request_body(request, &prompt)),
        )
        .instrument(info_span!("veo_start"))
        .await?;

        info!(operation = %started.name, "Started video operation");

        let handle = OperationHandle::new(started.name, token.access_token, self.poll.budget);
        let source = HttpOperationSource::new(self.http.clone(), self.model_url.clone());
        let response = poll_until_done(&source, &handle, self.poll.interval)
            .instrument(info_span!("veo_poll", operation = %handle.name))
            .await?;

        let response: VideoResponse = serde_json::from_value(response)
            .map_err(|e| ProviderError::provider(self.name(), format!("Invalid operation response: {}", e)))?;

        let Some(video) = response.videos.into_iter().next() else {
            if response.rai_media_filtered_count.unwrap_or(0) > 0 {
                warn!("Video filtered by safety settings");
                return Err(ProviderError::SafetyBlock("Generate".to_string()));
            }
            return Err(ProviderError::provider(self.name(), "Operation returned no videos"));
        };

        if video.gcs_uri.is_none() && video.bytes_base64_encoded.is_none() {
            return Err(ProviderError::provider(self.name(), "Video has neither a storage URI nor inline bytes"));
        }

        Ok(GenerationResult {
            base64: video.bytes_base64_encoded,
            storage_ref: video.gcs_uri,
            thumbnail: None,
            mime_type: video.mime_type.or_else(|| Some("video/mp4".to_string())),
            translated_prompt: prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use genbroker_models::GenerationParams;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::VertexConfig;

    const SERVICE_ACCOUNT: &str = include_str!("../../tests/fixtures/service_account.json");
    const MODEL_PATH: &str =
        "/projects/demo/locations/us-central1/publishers/google/models/veo-3.0-generate-001";

    fn config(server: &MockServer, budget: Duration) -> ProviderConfig {
        ProviderConfig {
            vertex: VertexConfig {
                base_url: server.uri(),
                project_id: "demo".into(),
                location: "us-central1".into(),
                model: "veo-3.0-generate-001".into(),
                storage_uri: Some("gs://bucket/videos/".into()),
            },
            token_endpoint: format!("{}/token", server.uri()),
            poll: PollConfig {
                budget,
                interval: Duration::from_millis(20),
            },
            ..Default::default()
        }
    }

    async fn mount_token_and_start(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.video",
                "expires_in": 3599
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("{}:predictLongRunning", MODEL_PATH)))
            .and(header("authorization", "Bearer ya29.video"))
            .and(body_partial_json(serde_json::json!({
                "instances": [{ "prompt": "waves" }],
                "parameters": { "sampleCount": 1, "aspectRatio": "16:9", "storageUri": "gs://bucket/videos/" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/demo/operations/op-1"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    fn request() -> GenerationRequest {
        let mut params = GenerationParams::new("waves");
        params.aspect_ratio = Some("16:9".into());
        GenerationRequest::generate(ModelKind::Veo, params)
    }

    #[tokio::test]
    async fn test_generate_polls_until_video_is_ready() {
        let server = MockServer::start().await;
        mount_token_and_start(&server).await;

        let fetch_path = format!("{}:fetchPredictOperation", MODEL_PATH);
        Mock::given(method("POST"))
            .and(path(fetch_path.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/demo/operations/op-1",
                "done": false
            })))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(fetch_path))
            .and(body_partial_json(serde_json::json!({
                "operationName": "projects/demo/operations/op-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/demo/operations/op-1",
                "done": true,
                "response": { "videos": [{ "gcsUri": "gs://bucket/videos/1.mp4", "mimeType": "video/mp4" }] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = VeoProvider::new(Client::new(), &config(&server, Duration::from_secs(5)));
        let result = provider.generate(&request(), SERVICE_ACCOUNT).await.unwrap();

        assert_eq!(result.storage_ref.as_deref(), Some("gs://bucket/videos/1.mp4"));
        assert_eq!(result.base64, None);
        assert_eq!(result.translated_prompt, "waves, aspect ratio 16:9");
    }

    #[tokio::test]
    async fn test_never_finishing_operation_times_out() {
        let server = MockServer::start().await;
        mount_token_and_start(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "done": false })))
            .mount(&server)
            .await;

        let provider = VeoProvider::new(Client::new(), &config(&server, Duration::from_millis(100)));
        let err = provider.generate(&request(), SERVICE_ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_filtered_video_is_safety_block() {
        let server = MockServer::start().await;
        mount_token_and_start(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("{}:fetchPredictOperation", MODEL_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "done": true,
                "response": { "raiMediaFilteredCount": 1 }
            })))
            .mount(&server)
            .await;

        let provider = VeoProvider::new(Client::new(), &config(&server, Duration::from_secs(5)));
        let err = provider.generate(&request(), SERVICE_ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ProviderError::SafetyBlock(_)));
    }

    #[tokio::test]
    async fn test_invalid_credential_document_is_auth_error() {
        let server = MockServer::start().await;
        let provider = VeoProvider::new(Client::new(), &config(&server, Duration::from_secs(5)));
        let err = provider.generate(&request(), "not json").await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_project_id_is_configuration_error() {
        let server = MockServer::start().await;
        let mut config = config(&server, Duration::from_secs(5));
        config.vertex.project_id = String::new();

        let provider = VeoProvider::new(Client::new(), &config);
        let err = provider.generate(&request(), SERVICE_ACCOUNT).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
