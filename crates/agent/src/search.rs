use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use posada_core::config::SearchConfig;

use crate::dates::contains_word;

const WEB_KEYWORDS: &[&str] = &[
    "clima",
    "weather",
    "temperatura",
    "restaurantes cerca",
    "donde comer",
    "dónde comer",
    "atracciones",
    "lugares para visitar",
    "que hacer",
    "qué hacer",
    "que visitar",
    "eventos",
    "festivales",
    "transporte",
    "como llegar",
    "cómo llegar",
    "taxi",
    "bus",
    "uber",
    "metropolitano",
    "aeropuerto",
    "vuelo",
    "flight",
    "terminal",
    "noticias",
    "actualidad",
];

const MAX_PROMPT_RESULTS: usize = 3;
const MAX_SNIPPET_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(String),
    #[error("search provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("search response could not be decoded: {0}")]
    Decode(String),
    #[error("search client misconfigured: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<SearchResponse, SearchError>;
}

#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    search_url: String,
    api_key: SecretString,
}

impl TavilyClient {
    pub fn new(base_url: &str, api_key: SecretString, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SearchError::Configuration(error.to_string()))?;
        Ok(Self {
            client,
            search_url: format!("{}/search", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SearchError::Configuration("search.api_key is not set".to_string()))?;
        Self::new(&config.base_url, api_key, Duration::from_secs(config.timeout_secs))
    }
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<SearchResponse, SearchError> {
        let body = TavilyRequest { api_key: self.api_key.expose_secret(), query, max_results };
        let response = self
            .client
            .post(&self.search_url)
            .json(&body)
            .send()
            .await
            .map_err(|error| SearchError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable error body".to_string());
            return Err(SearchError::Status { status: status.as_u16(), body });
        }

        let mut parsed: SearchResponse =
            response.json().await.map_err(|error| SearchError::Decode(error.to_string()))?;
        if parsed.query.is_empty() {
            parsed.query = query.to_string();
        }
        Ok(parsed)
    }
}

/// Whether the guest is asking about the outside world.
pub fn should_search_web(message: &str) -> bool {
    let lowered = message.to_lowercase();
    WEB_KEYWORDS.iter().any(|keyword| contains_word(&lowered, keyword))
}

/// Query sent to the provider, focused on the hotel's surroundings when a location is known.
pub fn search_query(message: &str, location: &str) -> String {
    let location = location.trim();
    if location.is_empty() {
        message.to_string()
    } else {
        format!("{message} near {location}")
    }
}

pub fn format_web_results(response: &SearchResponse) -> String {
    let mut block = String::from("\n===INFORMACIÓN DE LA WEB (BÚSQUEDA EXTERNA) ===\n");
    let _ = write!(block, "Consulta: {}\n\n", response.query);

    for (index, result) in response.results.iter().take(MAX_PROMPT_RESULTS).enumerate() {
        let _ = writeln!(block, "{}. {}", index + 1, result.title);
        if !result.content.is_empty() {
            let _ = writeln!(block, "   Contenido: {}", snippet(&result.content));
        }
        if !result.url.is_empty() {
            let _ = writeln!(block, "  Fuente: {}", result.url);
        }
        block.push('\n');
    }
    block.push_str("==== FIN INFORMACIÓN WEB ====\n\n");
    block
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= MAX_SNIPPET_CHARS {
        return content.to_string();
    }
    let mut truncated: String = content.chars().take(MAX_SNIPPET_CHARS).collect();
    truncated.push_str("...");
    truncated
}
