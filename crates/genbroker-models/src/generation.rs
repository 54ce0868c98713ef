//! Provider-agnostic generation parameters and results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::ModelKind;

/// Parameters for one generation or edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<String>,
    /// Base64 PNG to edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Prompt with style and aspect ratio hints appended.
    pub fn enhanced_prompt(&self) -> String {
        let mut prompt = self.prompt.clone();
        if !self.styles.is_empty() {
            prompt.push_str(&format!(", {} style", self.styles.join(", ")));
        }
        if let Some(ref ratio) = self.aspect_ratio {
            prompt.push_str(&format!(", aspect ratio {}", ratio));
        }
        prompt
    }
}

/// Whether a request creates a new asset or edits a supplied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Generate,
    Edit,
}

/// A fully validated request handed to a provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub model: ModelKind,
    pub mode: GenerationMode,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn generate(model: ModelKind, params: GenerationParams) -> Self {
        Self {
            model,
            mode: GenerationMode::Generate,
            params,
        }
    }

    pub fn edit(model: ModelKind, params: GenerationParams) -> Self {
        Self {
            model,
            mode: GenerationMode::Edit,
            params,
        }
    }
}

/// Output of a successful generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    /// Provider storage location (e.g. a gs:// URI for video output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub translated_prompt: String,
}

impl GenerationResult {
    pub fn image(base64: impl Into<String>, translated_prompt: impl Into<String>) -> Self {
        Self {
            base64: Some(base64.into()),
            translated_prompt: translated_prompt.into(),
            ..Default::default()
        }
    }

    /// Short description for audit records; never includes the payload bytes.
    pub fn summary(&self) -> String {
        match (&self.base64, &self.storage_ref) {
            (_, Some(uri)) => format!("stored at {}", uri),
            (Some(data), None) => format!("inline image ({} base64 chars)", data.len()),
            (None, None) => "empty result".to_string(),
        }
    }
}
