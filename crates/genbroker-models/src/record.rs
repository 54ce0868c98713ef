//! Audit record sent to the record sink.

use serde::{Deserialize, Serialize};

use crate::generation::GenerationResult;

/// One generation result or error, as the record sink expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEntry {
    pub prompt: String,
    pub result_summary: String,
    /// Base64 image data or storage reference; empty for errors
    pub payload: String,
    pub model_tag: String,
    pub is_error: bool,
}

impl RecordEntry {
    pub fn success(prompt: impl Into<String>, model_tag: impl Into<String>, result: &GenerationResult) -> Self {
        let payload = result
            .storage_ref
            .clone()
            .or_else(|| result.base64.clone())
            .unwrap_or_default();

        Self {
            prompt: prompt.into(),
            result_summary: result.translated_prompt.clone(),
            payload,
            model_tag: model_tag.into(),
            is_error: false,
        }
    }

    pub fn error(prompt: impl Into<String>, model_tag: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            result_summary: error.into(),
            payload: String::new(),
            model_tag: model_tag.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_entry_carries_payload() {
        let entry = RecordEntry::success("cat", "imagen-3.0-generate", &GenerationResult::image("AAAA", "a cat"));
        assert_eq!(entry.payload, "AAAA");
        assert_eq!(entry.result_summary, "a cat");
        assert!(!entry.is_error);
    }

    #[test]
    fn test_error_entry_wire_format() {
        let entry = RecordEntry::error("cat", "veo-3.0-generate", "blocked");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["modelTag"], "veo-3.0-generate");
        assert_eq!(value["resultSummary"], "blocked");
    }
}
