//! Per-request generation input.

/// Inline media sent beside a text instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) file content.
    pub data: String,
}

/// A single-turn prompt with its ordered media parts.
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    media: Vec<MediaPart>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            media: Vec::new(),
        }
    }

    pub fn with_media(prompt: impl Into<String>, media: Vec<MediaPart>) -> Self {
        Self {
            prompt: prompt.into(),
            media,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn media(&self) -> &[MediaPart] {
        &self.media
    }

    pub fn is_multimodal(&self) -> bool {
        !self.media.is_empty()
    }
}
