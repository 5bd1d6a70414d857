//! Media endpoints: one multipart file plus an optional prompt.

use crate::dtos::GenerationResponse;
use crate::models::GenerationRequest;
use crate::services::encoder::encode_upload;
use crate::services::{Generator, MediaForm, Upload};
use crate::startup::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use service_core::error::AppError;

/// Per-endpoint field name, label and fallback instruction.
#[derive(Debug, Clone, Copy)]
pub struct MediaEndpoint {
    pub field: &'static str,
    pub label: &'static str,
    pub default_prompt: &'static str,
}

pub const IMAGE: MediaEndpoint = MediaEndpoint {
    field: "image",
    label: "Image",
    default_prompt: "Describe this image",
};

pub const DOCUMENT: MediaEndpoint = MediaEndpoint {
    field: "document",
    label: "Document",
    default_prompt: "Analyze this document",
};

pub const AUDIO: MediaEndpoint = MediaEndpoint {
    field: "audio",
    label: "Audio",
    default_prompt: "Transcribe and analyze this audio",
};

impl MediaEndpoint {
    fn missing_file(&self) -> AppError {
        AppError::MissingInput(format!("{} file is required", self.label))
    }
}

#[tracing::instrument(skip(state, multipart))]
pub async fn generate_from_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    handle_media(&state, IMAGE, multipart).await
}

#[tracing::instrument(skip(state, multipart))]
pub async fn generate_from_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    handle_media(&state, DOCUMENT, multipart).await
}

#[tracing::instrument(skip(state, multipart))]
pub async fn generate_from_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    handle_media(&state, AUDIO, multipart).await
}

async fn handle_media(
    state: &AppState,
    endpoint: MediaEndpoint,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    // A body that is not multipart carries no file either.
    let mut multipart = multipart.map_err(|_| endpoint.missing_file())?;

    let form = state
        .uploads
        .receive_form(&mut multipart, endpoint.field)
        .await?;

    generate_from_form(&state.generator, endpoint, form)
        .await
        .map(|text| Json(GenerationResponse { text }))
}

/// Run the model on a received form. The upload is removed on every path.
async fn generate_from_form(
    generator: &Generator,
    endpoint: MediaEndpoint,
    form: MediaForm,
) -> Result<String, AppError> {
    let upload = form.upload.ok_or_else(|| endpoint.missing_file())?;

    let prompt = form
        .prompt
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| endpoint.default_prompt.to_string());

    let result = generate_with_upload(generator, prompt, &upload).await;
    tracing::info!(
        field = endpoint.field,
        mime_type = %upload.mime_type(),
        size = upload.size(),
        success = result.is_ok(),
        "Media request finished"
    );
    upload.discard().await;

    result
}

async fn generate_with_upload(
    generator: &Generator,
    prompt: String,
    upload: &Upload,
) -> Result<String, AppError> {
    let part = encode_upload(upload).await?;
    let request = GenerationRequest::with_media(prompt, vec![part]);
    generator.generate(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::{MockModel, MockReply};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn generator(model: Arc<MockModel>) -> Generator {
        Generator::new(model, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn upload_is_removed_after_success() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();
        let model = Arc::new(MockModel::new(MockReply::Echo));
        let form = MediaForm {
            prompt: Some(String::new()),
            upload: Some(Upload::new(&path, "text/plain")),
        };

        let text = generate_from_form(&generator(model.clone()), DOCUMENT, form)
            .await
            .unwrap();

        assert_eq!(text, "Analyze this document | text/plain");
        assert_eq!(model.calls().await[0].parts[0].data, "aGVsbG8=");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_upload_is_missing_input() {
        let model = Arc::new(MockModel::new(MockReply::Echo));

        let err = generate_from_form(&generator(model.clone()), AUDIO, MediaForm::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Audio file is required");
        assert_eq!(model.call_count().await, 0);
    }

    // The upload is a symlink to a directory: opening it succeeds, reading
    // fails, and removing it deletes the link.
    #[cfg(unix)]
    #[tokio::test]
    async fn encoding_failure_still_removes_upload() {
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::os::unix::fs::symlink(target.path(), &path).unwrap();
        let model = Arc::new(MockModel::new(MockReply::Echo));
        let form = MediaForm {
            prompt: None,
            upload: Some(Upload::new(&path, "image/png")),
        };

        let err = generate_from_form(&generator(model.clone()), IMAGE, form)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(model.call_count().await, 0);
        assert!(std::fs::symlink_metadata(&path).is_err());
    }
}
