//! Model and capability enums.
//!
//! Model names arrive as free strings from clients. They are parsed into a
//! closed enum here so that nothing past the request boundary ever sees an
//! unknown model.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Credential pool family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityClass {
    /// Text and predict-style image calls
    Default,
    /// Multimodal image generate/edit calls
    FlashImage,
    /// Delegated-identity video calls
    Video,
}

impl CapabilityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityClass::Default => "default",
            CapabilityClass::FlashImage => "flash-image",
            CapabilityClass::Video => "video",
        }
    }

    /// Environment variable prefix for this pool's secrets.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            CapabilityClass::Default => "GEMINI_API_KEY",
            CapabilityClass::FlashImage => "GEMINI_FLASH_IMAGE_API_KEY",
            CapabilityClass::Video => "VERTEX_SERVICE_ACCOUNT_JSON",
        }
    }

    pub fn all() -> [CapabilityClass; 3] {
        [CapabilityClass::Default, CapabilityClass::FlashImage, CapabilityClass::Video]
    }
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported generation models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ModelKind {
    #[serde(rename = "imagen-3.0-generate")]
    Imagen,
    #[serde(rename = "gemini-2.5-flash-image-preview")]
    FlashImage,
    #[serde(rename = "veo-3.0-generate")]
    Veo,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Imagen => "imagen-3.0-generate",
            ModelKind::FlashImage => "gemini-2.5-flash-image-preview",
            ModelKind::Veo => "veo-3.0-generate",
        }
    }

    /// Credential pool this model draws from.
    pub fn capability(&self) -> CapabilityClass {
        match self {
            ModelKind::Imagen => CapabilityClass::Default,
            ModelKind::FlashImage => CapabilityClass::FlashImage,
            ModelKind::Veo => CapabilityClass::Video,
        }
    }

    /// Whether the model accepts a base image for editing.
    pub fn supports_edit(&self) -> bool {
        matches!(self, ModelKind::FlashImage)
    }

    pub fn all() -> [ModelKind; 3] {
        [ModelKind::Imagen, ModelKind::FlashImage, ModelKind::Veo]
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown model name supplied by a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown model: {0}")]
pub struct UnknownModel(pub String);

impl FromStr for ModelKind {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::all()
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_round_trips_through_name() {
        for model in ModelKind::all() {
            assert_eq!(model.as_str().parse::<ModelKind>().unwrap(), model);
        }
    }

    #[test]
    fn test_unknown_model_rejected() {
        let err = "dall-e".parse::<ModelKind>().unwrap_err();
        assert_eq!(err, UnknownModel("dall-e".to_string()));
        tokio_test::assert_err!("".parse::<ModelKind>());
    }

    #[test]
    fn test_capability_mapping() {
        assert_eq!(ModelKind::Imagen.capability(), CapabilityClass::Default);
        assert_eq!(ModelKind::FlashImage.capability(), CapabilityClass::FlashImage);
        assert_eq!(ModelKind::Veo.capability(), CapabilityClass::Video);
        assert!(ModelKind::FlashImage.supports_edit());
        assert!(!ModelKind::Veo.supports_edit());
    }

    #[test]
    fn test_capability_serde_names() {
        assert_eq!(
            serde_json::to_string(&CapabilityClass::FlashImage).unwrap(),
            "\"flash-image\""
        );
    }
}
