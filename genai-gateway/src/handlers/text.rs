use crate::dtos::{GenerateTextRequest, GenerationResponse};
use crate::models::GenerationRequest;
use crate::startup::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

#[tracing::instrument(skip(state, payload))]
pub async fn generate_text(
    State(state): State<AppState>,
    payload: Result<Json<GenerateTextRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    request.validate()?;

    let text = state
        .generator
        .generate(&GenerationRequest::text(request.prompt))
        .await?;

    Ok(Json(GenerationResponse { text }))
}
