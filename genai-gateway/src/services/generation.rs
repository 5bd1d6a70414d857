//! Dispatch of generation requests to the configured model.

use crate::models::GenerationRequest;
use crate::services::providers::GenerativeModel;
use metrics::{counter, histogram};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Runs one generation request against the model with a bounded wait.
#[derive(Clone)]
pub struct Generator {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl Generator {
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn model(&self) -> &Arc<dyn GenerativeModel> {
        &self.model
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, AppError> {
        let operation = if request.is_multimodal() {
            "multimodal"
        } else {
            "text"
        };
        let start = Instant::now();

        let call = async {
            if request.is_multimodal() {
                self.model
                    .generate_multimodal(request.prompt(), request.media())
                    .await
            } else {
                self.model.generate_text(request.prompt()).await
            }
        };

        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(AppError::from(e)),
            Err(_) => Err(AppError::Timeout(format!(
                "Model did not respond within {} seconds",
                self.timeout.as_secs_f64()
            ))),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(AppError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        histogram!("genai_model_latency_seconds", "operation" => operation)
            .record(start.elapsed().as_secs_f64());
        counter!("genai_requests_total", "operation" => operation, "outcome" => outcome)
            .increment(1);

        tracing::info!(
            operation,
            outcome,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model call finished"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaPart;
    use crate::services::providers::mock::{MockModel, MockReply};
    use crate::services::providers::ModelError;

    #[tokio::test]
    async fn text_request_uses_text_operation() {
        let mock = Arc::new(MockModel::new(MockReply::Echo));
        let generator = Generator::new(mock.clone(), Duration::from_secs(5));

        let text = generator
            .generate(&GenerationRequest::text("Hello"))
            .await
            .unwrap();

        assert_eq!(text, "Hello");
        assert!(mock.calls().await[0].parts.is_empty());
    }

    #[tokio::test]
    async fn media_request_passes_parts_in_order() {
        let mock = Arc::new(MockModel::new(MockReply::Echo));
        let generator = Generator::new(mock.clone(), Duration::from_secs(5));
        let parts = vec![MediaPart {
            mime_type: "application/pdf".into(),
            data: "JVBERg==".into(),
        }];

        let text = generator
            .generate(&GenerationRequest::with_media("Analyze", parts.clone()))
            .await
            .unwrap();

        assert_eq!(text, "Analyze | application/pdf");
        assert_eq!(mock.calls().await[0].parts, parts);
    }

    #[tokio::test]
    async fn model_error_becomes_remote_error() {
        let mock = Arc::new(MockModel::new(MockReply::Fail(ModelError::ApiError(
            "quota exhausted".into(),
        ))));
        let generator = Generator::new(mock, Duration::from_secs(5));

        let err = generator
            .generate(&GenerationRequest::text("Hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Remote(ref m) if m == "quota exhausted"));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let mock = Arc::new(
            MockModel::new(MockReply::Text("late".into())).with_latency(Duration::from_secs(5)),
        );
        let generator = Generator::new(mock, Duration::from_millis(20));

        let err = generator
            .generate(&GenerationRequest::text("Hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout(_)));
    }
}
