//! Action request bodies and boundary validation.
//!
//! The single endpoint accepts a JSON object tagged by `action`. Model names
//! and job ids are parsed into typed values here; nothing deeper sees a raw
//! model string.

use serde::{Deserialize, Serialize};

use genbroker_models::{
    is_valid_job_id, GenerationParams, GenerationRequest, JobId, ModelKind,
};

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
pub enum ActionRequest {
    #[serde(rename = "auth")]
    Auth(AuthBody),
    #[serde(rename = "translate")]
    Translate(TranslateBody),
    #[serde(rename = "generate_fg")]
    GenerateFg(GenerateBody),
    #[serde(rename = "edit_fg")]
    EditFg(GenerateBody),
    #[serde(rename = "submit_bg_job")]
    SubmitBgJob(SubmitJobBody),
    #[serde(rename = "check_status")]
    CheckStatus(CheckStatusBody),
    #[serde(rename = "logError")]
    LogError(LogErrorBody),
}

impl ActionRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ActionRequest::Auth(_) => "auth",
            ActionRequest::Translate(_) => "translate",
            ActionRequest::GenerateFg(_) => "generate_fg",
            ActionRequest::EditFg(_) => "edit_fg",
            ActionRequest::SubmitBgJob(_) => "submit_bg_job",
            ActionRequest::CheckStatus(_) => "check_status",
            ActionRequest::LogError(_) => "logError",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthBody {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, alias = "keyIndex")]
    pub rotation_index: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "keyIndex")]
    pub rotation_index: u64,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub base_image: Option<String>,
}

impl GenerateBody {
    fn params(&self) -> ApiResult<GenerationParams> {
        let prompt = require_prompt(&self.prompt)?;
        Ok(GenerationParams {
            prompt,
            aspect_ratio: self.aspect_ratio.clone().filter(|r| !r.is_empty()),
            styles: self.styles.iter().filter(|s| !s.is_empty()).cloned().collect(),
            base_image: self.base_image.clone().filter(|b| !b.is_empty()),
        })
    }

    /// Validated request for `generate_fg`.
    pub fn into_generate(self) -> ApiResult<GenerationRequest> {
        let model = require_model(self.model.as_deref())?;
        Ok(GenerationRequest::generate(model, self.params()?))
    }

    /// Validated request for `edit_fg`. The model defaults to the edit-capable one.
    pub fn into_edit(self) -> ApiResult<GenerationRequest> {
        let model = match self.model.as_deref() {
            None | Some("") => ModelKind::FlashImage,
            Some(name) => name.parse()?,
        };
        if !model.supports_edit() {
            return Err(ApiError::validation(format!("Model {} does not support editing", model)));
        }

        let params = self.params()?;
        if params.base_image.is_none() {
            return Err(ApiError::validation("baseImage is required for editing"));
        }
        Ok(GenerationRequest::edit(model, params))
    }
}

/// `submit_bg_job` accepts the generation parameters either nested under
/// `jobPayload` or inline beside `model`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobBody {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "keyIndex")]
    pub rotation_index: u64,
    #[serde(default)]
    pub job_payload: Option<GenerationParams>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub base_image: Option<String>,
}

impl SubmitJobBody {
    pub fn validate(self) -> ApiResult<(ModelKind, GenerationParams, u64)> {
        let model = require_model(self.model.as_deref())?;
        let mut payload = match self.job_payload {
            Some(payload) => payload,
            None => GenerationParams {
                prompt: self.prompt.unwrap_or_default(),
                aspect_ratio: self.aspect_ratio,
                styles: self.styles,
                base_image: self.base_image,
            },
        };
        payload.prompt = require_prompt(&payload.prompt)?;
        Ok((model, payload, self.rotation_index))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusBody {
    #[serde(default)]
    pub job_id: String,
}

impl CheckStatusBody {
    pub fn job_id(&self) -> ApiResult<JobId> {
        if !is_valid_job_id(&self.job_id) {
            return Err(ApiError::validation("Invalid jobId"));
        }
        Ok(JobId::from_string(self.job_id.clone()))
    }
}

#[derive(Debug, Deserialize)]
pub struct LogErrorBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: JobId,
}

fn require_prompt(prompt: &str) -> ApiResult<String> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::validation("prompt is required"));
    }
    Ok(prompt.to_string())
}

fn require_model(model: Option<&str>) -> ApiResult<ModelKind> {
    match model {
        None | Some("") => Err(ApiError::validation("model is required")),
        Some(name) => Ok(name.parse()?),
    }
}
