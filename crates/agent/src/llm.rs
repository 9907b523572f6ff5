use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use posada_core::config::LlmConfig;
use posada_core::domain::conversation::ChatMessage;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm response could not be decoded: {0}")]
    Decode(String),
    #[error("llm client misconfigured: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionParams {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self { model: "llama-3.1-8b-instant".to_string(), temperature: 0.7, max_tokens: 500 }
    }
}

/// One generated reply. Empty `content` means the backend returned no choice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub total_tokens: u32,
    pub model: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, LlmError>;
}

/// Chat-completions client for Groq, OpenAI and Ollama's compatible endpoint.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    completions_url: String,
    api_key: Option<SecretString>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Configuration(error.to_string()))?;
        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(config.endpoint(), config.api_key.clone(), Duration::from_secs(config.timeout_secs))
    }

    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<Completion, LlmError> {
        let body = CompletionRequest::new(messages, params);
        let mut request = self.client.post(&self.completions_url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| LlmError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        Ok(parsed.into_completion(&params.model))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

impl<'a> CompletionRequest<'a> {
    fn new(messages: &'a [ChatMessage], params: &'a CompletionParams) -> Self {
        Self {
            model: &params.model,
            messages: messages
                .iter()
                .map(|message| WireMessage { role: message.role.as_str(), content: &message.content })
                .collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u32,
}

impl CompletionResponse {
    fn into_completion(self, requested_model: &str) -> Completion {
        Completion {
            content: self
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default(),
            total_tokens: self.usage.map(|usage| usage.total_tokens).unwrap_or_default(),
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
        }
    }
}
