//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use closer_core::config::LlmConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::llm::{http_client, non_empty_output, GenerationError, GenerationRequest, LlmClient};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const CHARS_PER_TOKEN: usize = 4;

pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_tokens: u32,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GenerationError::Configuration("llm.api_key is required for the openai provider".to_string())
        })?;
        Self::new(
            api_key,
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            config.model.clone(),
            config.timeout_secs,
            config.max_tokens,
        )
    }

    fn request_body(&self, request: &GenerationRequest) -> Value {
        let wanted = u32::try_from(request.max_chars / CHARS_PER_TOKEN + 1).unwrap_or(u32::MAX);
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.prompt },
            ],
            "max_tokens": wanted.min(self.max_tokens),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(GenerationError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status: status.as_u16(), message });
        }

        let text = response.text().await?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|error| GenerationError::MalformedOutput(error.to_string()))?;
        non_empty_output(
            json["choices"]
                .as_array()
                .and_then(|choices| choices.first())
                .and_then(|choice| choice["message"]["content"].as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use closer_core::domain::experiment::Tone;

    use super::OpenAiClient;
    use crate::llm::GenerationRequest;

    #[test]
    fn request_body_carries_both_prompts_and_a_token_cap() {
        let client = OpenAiClient::new(
            "sk-test".to_string().into(),
            "https://llm.example.test/v1/",
            "gpt-4o-mini",
            10,
            50,
        )
        .expect("client builds");
        let request = GenerationRequest {
            system_prompt: "You are a dealership assistant.".to_string(),
            prompt: "Customer: is the Civic in stock?".to_string(),
            max_chars: 400,
            tone: Tone::Friendly,
        };

        let body = client.request_body(&request);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Customer: is the Civic in stock?");
        assert_eq!(body["max_tokens"], 50);
        assert_eq!(client.base_url, "https://llm.example.test/v1");
    }
}
