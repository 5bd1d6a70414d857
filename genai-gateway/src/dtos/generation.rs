use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Message returned when `/generate-text` receives no prompt.
pub const EMPTY_PROMPT_MESSAGE: &str = "Prompt tidak boleh kosong";

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateTextRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(length(min = 1, message = "Prompt tidak boleh kosong"))]
    pub prompt: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
}
