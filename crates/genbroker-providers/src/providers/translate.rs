//! Prompt translation/refinement through a text model.

use reqwest::Client;
use tracing::{debug, info_span, Instrument};

use super::gemini::{Content, GenerateContentRequest, GenerateContentResponse, Part, API_KEY_HEADER};
use super::send_json;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};

pub const TRANSLATE_SYSTEM_PROMPT: &str = "You are a translation assistant. Translate the following text into a clear, effective, and creative English prompt for an AI image generator. If the input is already in English, refine it for clarity and creative potential.";

/// Text-generation client for the `translate` action.
pub struct TranslateClient {
    http: Client,
    endpoint: String,
}

impl TranslateClient {
    pub fn new(http: Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.api_base_url.trim_end_matches('/'),
                config.translate_model
            ),
        }
    }

    /// Translate `prompt` into a refined English image prompt.
    pub async fn translate(&self, prompt: &str, api_key: &str) -> ProviderResult<String> {
        if prompt.trim().is_empty() {
            return Err(ProviderError::validation("prompt is required"));
        }

        let body = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(format!(
                "Translate and refine: \"{}\"",
                prompt
            ))])],
            system_instruction: Some(Content::system(TRANSLATE_SYSTEM_PROMPT)),
            generation_config: None,
            safety_settings: Vec::new(),
        };

        let response: GenerateContentResponse = send_json(
            "translate",
            self.http
                .post(&self.endpoint)
                .header(API_KEY_HEADER, api_key)
                .json(&body),
        )
        .instrument(info_span!("translate_prompt"))
        .await?;

        let text = response
            .first_text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::provider("translate", "No text in response"))?;

        debug!(chars = text.len(), "Translated prompt");
        Ok(text.to_string())
    }
}
