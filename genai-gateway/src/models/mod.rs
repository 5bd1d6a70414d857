pub mod generation;

pub use generation::{GenerationRequest, MediaPart};
