//! Gemini model implementation.
//!
//! Calls `models/{model}:generateContent` on Google's Generative Language API.
//! Text prompts go to the text model, prompts with inline media to the vision
//! model.

use super::{GenerativeModel, ModelError};
use crate::models::MediaPart;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Base URL up to and including the API version, without trailing slash.
    pub api_base: String,
    pub text_model: String,
    pub vision_model: String,
}

/// Gemini generative model client.
pub struct GeminiModel {
    config: GeminiConfig,
    client: Client,
}

impl GeminiModel {
    pub fn new(config: GeminiConfig) -> Result<Self, ModelError> {
        // Overall call duration is bounded by the caller.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ModelError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.api_base.trim_end_matches('/'),
            model,
            method
        )
    }

    async fn generate_content(
        &self,
        model: &str,
        parts: Vec<ContentPart>,
    ) -> Result<String, ModelError> {
        if self.config.api_key.is_empty() {
            return Err(ModelError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
        };

        let response = self
            .client
            .post(self.api_url(model, "generateContent"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ModelError::RateLimited(upstream_message(&error_text)));
            }

            return Err(ModelError::ApiError(format!(
                "Gemini API error {}: {}",
                status,
                upstream_message(&error_text)
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ApiError(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &api_response.usage_metadata {
            tracing::debug!(
                model = %model,
                input_tokens = usage.prompt_token_count.unwrap_or(0),
                output_tokens = usage.candidates_token_count.unwrap_or(0),
                "Gemini usage"
            );
        }

        api_response.into_text()
    }
}

/// Pull `error.message` out of a Gemini error body, falling back to the raw text.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn generate_text(&self, prompt: &str) -> Result<String, ModelError> {
        tracing::debug!(
            model = %self.config.text_model,
            prompt_len = prompt.len(),
            "Sending text request to Gemini API"
        );

        let parts = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        self.generate_content(&self.config.text_model, parts).await
    }

    async fn generate_multimodal(
        &self,
        prompt: &str,
        media: &[MediaPart],
    ) -> Result<String, ModelError> {
        tracing::debug!(
            model = %self.config.vision_model,
            prompt_len = prompt.len(),
            part_count = media.len(),
            "Sending multimodal request to Gemini API"
        );

        let mut parts = Vec::with_capacity(media.len() + 1);
        parts.push(ContentPart::Text {
            text: prompt.to_string(),
        });
        parts.extend(media.iter().map(|m| ContentPart::InlineData {
            inline_data: InlineData {
                mime_type: m.mime_type.clone(),
                data: m.data.clone(),
            },
        }));

        self.generate_content(&self.config.vision_model, parts)
            .await
    }

    async fn health_check(&self) -> Result<(), ModelError> {
        if self.config.api_key.is_empty() {
            return Err(ModelError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    /// Part kinds the gateway does not use (function calls, thoughts, ...).
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Result<String, ModelError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::ContentFiltered(format!("prompt blocked ({})", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyResponse)?;

        let text: String = candidate
            .content
            .unwrap_or_default()
            .parts
            .into_iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(text),
                _ => None,
            })
            .collect();

        if text.is_empty() {
            if let Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")) =
                candidate.finish_reason.as_deref()
            {
                return Err(ModelError::ContentFiltered(format!(
                    "generation stopped ({})",
                    reason
                )));
            }
            return Err(ModelError::EmptyResponse);
        }

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn inline_data_serializes_in_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![
                    ContentPart::Text {
                        text: "Describe this image".into(),
                    },
                    ContentPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".into(),
                            data: "iVBORw0=".into(),
                        },
                    },
                ],
            }],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "Describe this image" },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw0=" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn text_parts_of_first_candidate_are_joined() {
        let response = parse(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "Hi " }, { "text": "there" }] },
                  "finishReason": "STOP" },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }));

        assert_eq!(response.into_text().unwrap(), "Hi there");
    }

    #[test]
    fn unknown_part_kinds_are_skipped() {
        let response = parse(json!({
            "candidates": [{ "content": { "parts": [
                { "functionCall": { "name": "noop", "args": {} } },
                { "text": "done" }
            ] } }]
        }));

        assert_eq!(response.into_text().unwrap(), "done");
    }

    #[test]
    fn blocked_prompt_is_content_filtered() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        assert_eq!(
            response.into_text(),
            Err(ModelError::ContentFiltered("prompt blocked (SAFETY)".into()))
        );
    }

    #[test]
    fn safety_stop_without_text_is_content_filtered() {
        let response = parse(json!({ "candidates": [{ "finishReason": "SAFETY" }] }));
        assert_eq!(
            response.into_text(),
            Err(ModelError::ContentFiltered("generation stopped (SAFETY)".into()))
        );
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let response = parse(json!({}));
        assert_eq!(response.into_text(), Err(ModelError::EmptyResponse));
    }

    #[test]
    fn upstream_message_prefers_error_message_field() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(upstream_message(body), "API key not valid");
        assert_eq!(upstream_message("plain failure"), "plain failure");
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let model = GeminiModel::new(GeminiConfig {
            api_key: String::new(),
            api_base: "http://127.0.0.1:9".into(),
            text_model: "gemini-2.0-flash".into(),
            vision_model: "gemini-2.0-flash".into(),
        })
        .unwrap();

        assert!(matches!(
            model.generate_text("Hello").await,
            Err(ModelError::NotConfigured(_))
        ));
        assert!(model.health_check().await.is_err());
    }
}
