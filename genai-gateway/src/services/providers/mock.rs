//! Mock model for tests and credential-free local runs.

use super::{GenerativeModel, ModelError};
use crate::models::MediaPart;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Always return this text.
    Text(String),
    /// Return the prompt, followed by the media types of any parts.
    Echo,
    /// Always fail with this error.
    Fail(ModelError),
}

/// A call the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub prompt: String,
    pub parts: Vec<MediaPart>,
}

/// Mock generative model.
pub struct MockModel {
    reply: MockReply,
    latency: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockModel {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every call by `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every call received so far, oldest first.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn respond(&self, prompt: &str, parts: &[MediaPart]) -> Result<String, ModelError> {
        self.calls.lock().await.push(RecordedCall {
            prompt: prompt.to_string(),
            parts: parts.to_vec(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Fail(err) => Err(err.clone()),
            MockReply::Echo => {
                let mut text = prompt.to_string();
                for part in parts {
                    text.push_str(" | ");
                    text.push_str(&part.mime_type);
                }
                Ok(text)
            }
        }
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    async fn generate_text(&self, prompt: &str) -> Result<String, ModelError> {
        self.respond(prompt, &[]).await
    }

    async fn generate_multimodal(
        &self,
        prompt: &str,
        parts: &[MediaPart],
    ) -> Result<String, ModelError> {
        self.respond(prompt, parts).await
    }

    async fn health_check(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_includes_part_types() {
        let mock = MockModel::new(MockReply::Echo);
        let parts = vec![MediaPart {
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        }];

        let text = mock.generate_multimodal("Describe", &parts).await.unwrap();

        assert_eq!(text, "Describe | image/png");
        assert_eq!(
            mock.calls().await,
            vec![RecordedCall {
                prompt: "Describe".into(),
                parts
            }]
        );
    }

    #[tokio::test]
    async fn failing_mock_still_records_call() {
        let error = ModelError::RateLimited("Quota exceeded".into());
        let mock = MockModel::new(MockReply::Fail(error.clone()));

        assert_eq!(mock.generate_text("Hello").await, Err(error));
        assert_eq!(mock.call_count().await, 1);
    }
}
