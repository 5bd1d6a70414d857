//! HTTP handlers for the gateway.

pub mod health;
pub mod media;
pub mod text;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use media::{generate_from_audio, generate_from_document, generate_from_image};
pub use text::generate_text;
