//! Generative model abstractions and implementations.
//!
//! The gateway talks to models only through [`GenerativeModel`], so the
//! Gemini backend can be swapped for the mock in tests.

pub mod gemini;
pub mod mock;

use crate::models::MediaPart;
use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("{0}")]
    ApiError(String),

    #[error("Rate limited by model provider: {0}")]
    RateLimited(String),

    #[error("Response blocked by model safety filters: {0}")]
    ContentFiltered(String),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Remote(err.to_string())
    }
}

/// A remote model with a text-only and a multimodal generation endpoint.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Single-turn, text-only generation.
    async fn generate_text(&self, prompt: &str) -> Result<String, ModelError>;

    /// Single-turn generation from one instruction followed by inline media parts.
    async fn generate_multimodal(
        &self,
        prompt: &str,
        parts: &[MediaPart],
    ) -> Result<String, ModelError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ModelError>;
}
