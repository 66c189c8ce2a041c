use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use closer_core::config::{LlmConfig, LlmProvider};
use closer_core::domain::experiment::Tone;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;

/// One generation call: the context prompt plus the constraints the reply must respect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub max_chars: usize,
    pub tone: Tone,
}

/// Every variant is treated as transient by the pipeline: it falls back, it never fails.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation timed out after {0} ms")]
    Timeout(u64),
    #[error("generation service rate limited the request")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("generation service returned malformed output: {0}")]
    MalformedOutput(String),
    #[error("generation service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("generation service is unreachable: {0}")]
    Transport(String),
    #[error("generation client is misconfigured: {0}")]
    Configuration(String),
}

impl GenerationError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::MalformedOutput(_) => "malformed_output",
            Self::Api { .. } => "api_error",
            Self::Transport(_) => "transport",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(0)
        } else if error.is_decode() {
            Self::MalformedOutput(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Trims the reply and rejects empty output.
pub(crate) fn non_empty_output(content: Option<&str>) -> Result<String, GenerationError> {
    match content.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        Some(_) => Err(GenerationError::MalformedOutput("empty completion".to_string())),
        None => Err(GenerationError::MalformedOutput("completion text is missing".to_string())),
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| GenerationError::Configuration(error.to_string()))
}

pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, GenerationError> {
    match config.provider {
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiClient::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use closer_core::config::{LlmConfig, LlmProvider};

    use super::{build_client, non_empty_output, GenerationError};

    #[test]
    fn empty_completions_are_malformed() {
        assert_eq!(non_empty_output(Some("  Hi there!  ")), Ok("Hi there!".to_string()));
        assert!(matches!(non_empty_output(Some("   ")), Err(GenerationError::MalformedOutput(_))));
        assert!(matches!(non_empty_output(None), Err(GenerationError::MalformedOutput(_))));
    }

    #[test]
    fn build_client_follows_the_configured_provider() {
        let ollama = build_client(&LlmConfig::default()).expect("ollama client");
        assert_eq!(ollama.name(), "ollama");

        let openai = LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key: Some("sk-test".to_string().into()),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(build_client(&openai).expect("openai client").name(), "openai");
    }

    #[test]
    fn openai_without_api_key_is_a_configuration_error() {
        let config = LlmConfig { provider: LlmProvider::OpenAi, api_key: None, ..LlmConfig::default() };

        let error = build_client(&config).err().expect("missing key must fail");
        assert_eq!(error.reason_code(), "configuration");
    }
}
