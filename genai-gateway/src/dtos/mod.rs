pub mod generation;

pub use generation::{GenerateTextRequest, GenerationResponse};
