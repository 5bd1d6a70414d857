use serde::Deserialize;
use service_core::config::{self as core_config, get_env, is_production};
use service_core::error::AppError;

/// Public Gemini REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default per-file upload cap (20MB).
const DEFAULT_UPLOAD_MAX_BYTES: u64 = 20 * 1024 * 1024;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub model: ModelConfig,
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    /// Empty when running against the mock provider.
    pub api_key: String,
    pub api_base: String,
    /// Model for text-only prompts (e.g., gemini-2.0-flash)
    pub text_model: String,
    /// Model for prompts carrying inline media
    pub vision_model: String,
    /// Upper bound on a single remote call, in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Scratch directory for in-flight uploads.
    pub dir: String,
    pub max_bytes: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            _ => Err(format!("Invalid model provider: {}", s)),
        }
    }
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        let provider: ProviderKind = get_env("GENAI_PROVIDER", Some("gemini"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let api_key = match provider {
            ProviderKind::Gemini => get_env("GEMINI_API_KEY", None, is_prod)?,
            ProviderKind::Mock => get_env("GEMINI_API_KEY", Some(""), false)?,
        };

        Ok(GatewayConfig {
            common: common_config,
            model: ModelConfig {
                provider,
                api_key,
                api_base: get_env("GENAI_API_BASE", Some(DEFAULT_API_BASE), false)?,
                text_model: get_env("GENAI_TEXT_MODEL", Some("gemini-2.0-flash"), false)?,
                vision_model: get_env("GENAI_VISION_MODEL", Some("gemini-2.0-flash"), false)?,
                request_timeout_secs: nonzero(
                    "GENAI_REQUEST_TIMEOUT_SECS",
                    parse_number("GENAI_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
                )?,
            },
            uploads: UploadConfig {
                dir: get_env("UPLOAD_DIR", Some("uploads"), false)?,
                max_bytes: parse_number("UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES)?,
            },
        })
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.model.request_timeout_secs)
    }
}

fn parse_number(key: &str, default: u64) -> Result<u64, AppError> {
    get_env(key, Some(&default.to_string()), false)?
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} must be a number: {}", key, e)))
}

fn nonzero(key: &str, value: u64) -> Result<u64, AppError> {
    if value == 0 {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<ProviderKind>(), Ok(ProviderKind::Gemini));
        assert_eq!("mock".parse::<ProviderKind>(), Ok(ProviderKind::Mock));
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn parse_number_falls_back_to_default() {
        let value = parse_number("GENAI_GATEWAY_TEST_UNSET_NUMBER", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = nonzero("GENAI_REQUEST_TIMEOUT_SECS", 0).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert_eq!(nonzero("GENAI_REQUEST_TIMEOUT_SECS", 30).unwrap(), 30);
    }
}
