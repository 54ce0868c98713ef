//! Multimodal image generation and editing.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, info_span, warn, Instrument};

use genbroker_models::{GenerationMode, GenerationRequest, GenerationResult, ModelKind};

use super::gemini::{
    permissive_safety_settings, Content, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, Part, API_KEY_HEADER,
};
use super::{send_json, GenerationProvider};
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};

const BASE_IMAGE_MIME: &str = "image/png";

pub struct FlashImageProvider {
    http: Client,
    endpoint: String,
}

impl FlashImageProvider {
    pub fn new(http: Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_base_url.trim_end_matches('/'),
                config.flash_image_model
            ),
        }
    }

    /// Request parts plus the prompt reported back to the caller.
    fn build_parts(request: &GenerationRequest) -> ProviderResult<(Vec<Part>, String)> {
        match request.mode {
            GenerationMode::Generate => {
                let prompt = request.params.enhanced_prompt();
                Ok((vec![Part::text(prompt.clone())], prompt))
            }
            GenerationMode::Edit => {
                let base_image = request
                    .params
                    .base_image
                    .as_deref()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| ProviderError::validation("baseImage is required for editing"))?;
                let parts = vec![
                    Part::text(request.params.prompt.clone()),
                    Part::inline(BASE_IMAGE_MIME, base_image),
                ];
                Ok((parts, format!("[Edit] {}", request.params.prompt)))
            }
        }
    }
}

#[async_trait]
impl GenerationProvider for FlashImageProvider {
    fn name(&self) -> &'static str {
        "flash_image"
    }

    fn model(&self) -> ModelKind {
        ModelKind::FlashImage
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &str,
    ) -> ProviderResult<GenerationResult> {
        let (parts, reported_prompt) = Self::build_parts(request)?;
        let action = match request.mode {
            GenerationMode::Generate => "Generate",
            GenerationMode::Edit => "Edit",
        };

        let body = GenerateContentRequest {
            contents: vec![Content::user(parts)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            }),
            safety_settings: permissive_safety_settings(),
        };

        let span = info_span!("flash_image_generate", mode = action);
        let response: GenerateContentResponse = send_json(
            self.name(),
            self.http
                .post(&self.endpoint)
                .header(API_KEY_HEADER, credential)
                .json(&body),
        )
        .instrument(span)
        .await?;

        if let Some(image) = response.first_inline_data() {
            info!(mode = action, bytes = image.data.len(), "Flash image returned an image");
            return Ok(GenerationResult {
                base64: Some(image.data.clone()),
                mime_type: Some(image.mime_type.clone()),
                translated_prompt: reported_prompt,
                ..Default::default()
            });
        }

        if response.is_safety_blocked() {
            warn!(mode = action, "Flash image blocked by safety filters");
            return Err(ProviderError::SafetyBlock(action.to_string()));
        }

        let message = response
            .first_text()
            .map(|t| format!("No image in response: {}", t))
            .unwrap_or_else(|| "No image in response".to_string());
        Err(ProviderError::provider(self.name(), message))
    }
}
