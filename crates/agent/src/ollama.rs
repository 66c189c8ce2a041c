//! Ollama chat client.

use async_trait::async_trait;
use closer_core::config::LlmConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::llm::{http_client, non_empty_output, GenerationError, GenerationRequest, LlmClient};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// Rough characters-per-token ratio used to turn a reply length into `num_predict`.
const CHARS_PER_TOKEN: usize = 4;

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
        max_tokens: u32,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        Self::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            config.model.clone(),
            config.timeout_secs,
            config.max_tokens,
        )
    }

    fn num_predict(&self, max_chars: usize) -> u32 {
        let wanted = u32::try_from(max_chars / CHARS_PER_TOKEN + 1).unwrap_or(u32::MAX);
        wanted.min(self.max_tokens)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system", content: &request.system_prompt },
                Message { role: "user", content: &request.prompt },
            ],
            stream: false,
            options: ChatOptions { num_predict: self.num_predict(request.max_chars) },
        };

        let response =
            self.client.post(format!("{}/api/chat", self.base_url)).json(&body).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited { retry_after_secs: None });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status: status.as_u16(), message });
        }

        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|error| GenerationError::MalformedOutput(error.to_string()))?;
        non_empty_output(parsed.message.and_then(|message| message.content).as_deref())
    }
}

#[cfg(test)]
mod tests {
    use closer_core::config::LlmConfig;

    use super::OllamaClient;

    #[test]
    fn num_predict_is_capped_by_max_tokens() {
        let client = OllamaClient::from_config(&LlmConfig { max_tokens: 120, ..LlmConfig::default() })
            .expect("client builds");

        assert_eq!(client.num_predict(160), 41);
        assert_eq!(client.num_predict(4_000), 120);
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = OllamaClient::new("http://ollama.internal:11434/", "llama3.1", 10, 400)
            .expect("client builds");

        assert_eq!(client.base_url, "http://ollama.internal:11434");
    }
}
