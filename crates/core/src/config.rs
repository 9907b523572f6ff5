use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub chat: ChatConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub max_results: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub hotel_location: String,
    pub utc_offset_minutes: i32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_messages: u32,
    pub search_cache_ttl_secs: u64,
    pub history_window: usize,
    pub max_tool_iterations: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub search_enabled: Option<bool>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://posada.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Groq,
                api_key: None,
                base_url: None,
                model: "llama-3.1-8b-instant".to_string(),
                temperature: 0.7,
                max_tokens: 500,
                timeout_secs: 30,
            },
            search: SearchConfig {
                enabled: false,
                api_key: None,
                base_url: "https://api.tavily.com".to_string(),
                max_results: 3,
                timeout_secs: 10,
            },
            chat: ChatConfig {
                hotel_location: "Lima, Perú".to_string(),
                utc_offset_minutes: -300,
                rate_limit_window_secs: 60,
                rate_limit_max_messages: 20,
                search_cache_ttl_secs: 3600,
                history_window: 10,
                max_tool_iterations: 3,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmConfig {
    /// Configured base URL, falling back to the provider's public endpoint.
    pub fn endpoint(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("posada.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(search) = patch.search {
            if let Some(enabled) = search.enabled {
                self.search.enabled = enabled;
            }
            if let Some(search_api_key_value) = search.api_key {
                self.search.api_key = Some(secret_value(search_api_key_value));
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(max_results) = search.max_results {
                self.search.max_results = max_results;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(hotel_location) = chat.hotel_location {
                self.chat.hotel_location = hotel_location;
            }
            if let Some(utc_offset_minutes) = chat.utc_offset_minutes {
                self.chat.utc_offset_minutes = utc_offset_minutes;
            }
            if let Some(window) = chat.rate_limit_window_secs {
                self.chat.rate_limit_window_secs = window;
            }
            if let Some(max_messages) = chat.rate_limit_max_messages {
                self.chat.rate_limit_max_messages = max_messages;
            }
            if let Some(ttl) = chat.search_cache_ttl_secs {
                self.chat.search_cache_ttl_secs = ttl;
            }
            if let Some(history_window) = chat.history_window {
                self.chat.history_window = history_window;
            }
            if let Some(max_tool_iterations) = chat.max_tool_iterations {
                self.chat.max_tool_iterations = max_tool_iterations;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("POSADA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("POSADA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("POSADA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("POSADA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("POSADA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POSADA_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let llm_api_key = read_env("POSADA_LLM_API_KEY").or_else(|| read_env("GROQ_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("POSADA_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("POSADA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("POSADA_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("POSADA_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("POSADA_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("POSADA_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("POSADA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("POSADA_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POSADA_SEARCH_ENABLED") {
            self.search.enabled = parse_bool("POSADA_SEARCH_ENABLED", &value)?;
        }
        let search_api_key =
            read_env("POSADA_SEARCH_API_KEY").or_else(|| read_env("TAVILY_API_KEY"));
        if let Some(value) = search_api_key {
            self.search.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("POSADA_SEARCH_BASE_URL") {
            self.search.base_url = value;
        }
        if let Some(value) = read_env("POSADA_SEARCH_MAX_RESULTS") {
            self.search.max_results = parse_u32("POSADA_SEARCH_MAX_RESULTS", &value)?;
        }
        if let Some(value) = read_env("POSADA_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_u64("POSADA_SEARCH_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POSADA_CHAT_HOTEL_LOCATION") {
            self.chat.hotel_location = value;
        }
        if let Some(value) = read_env("POSADA_CHAT_UTC_OFFSET_MINUTES") {
            self.chat.utc_offset_minutes = parse_i32("POSADA_CHAT_UTC_OFFSET_MINUTES", &value)?;
        }
        if let Some(value) = read_env("POSADA_CHAT_RATE_LIMIT_WINDOW_SECS") {
            self.chat.rate_limit_window_secs =
                parse_u64("POSADA_CHAT_RATE_LIMIT_WINDOW_SECS", &value)?;
        }
        if let Some(value) = read_env("POSADA_CHAT_RATE_LIMIT_MAX_MESSAGES") {
            self.chat.rate_limit_max_messages =
                parse_u32("POSADA_CHAT_RATE_LIMIT_MAX_MESSAGES", &value)?;
        }
        if let Some(value) = read_env("POSADA_CHAT_SEARCH_CACHE_TTL_SECS") {
            self.chat.search_cache_ttl_secs =
                parse_u64("POSADA_CHAT_SEARCH_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("POSADA_CHAT_HISTORY_WINDOW") {
            self.chat.history_window = parse_u32("POSADA_CHAT_HISTORY_WINDOW", &value)? as usize;
        }
        if let Some(value) = read_env("POSADA_CHAT_MAX_TOOL_ITERATIONS") {
            self.chat.max_tool_iterations = parse_u32("POSADA_CHAT_MAX_TOOL_ITERATIONS", &value)?;
        }

        if let Some(value) = read_env("POSADA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("POSADA_SERVER_PORT") {
            self.server.port = parse_u16("POSADA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("POSADA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("POSADA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("POSADA_LOGGING_LEVEL").or_else(|| read_env("POSADA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("POSADA_LOGGING_FORMAT").or_else(|| read_env("POSADA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(search_enabled) = overrides.search_enabled {
            self.search.enabled = search_enabled;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_search(&self.search)?;
        validate_chat(&self.chat)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("posada.toml"), PathBuf::from("config/posada.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::Groq | LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for groq/openai providers. Set POSADA_LLM_API_KEY (or GROQ_API_KEY)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if !search.enabled {
        return Ok(());
    }

    let missing = search
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "search.api_key is required when search.enabled is true. Set POSADA_SEARCH_API_KEY (or TAVILY_API_KEY)"
                .to_string(),
        ));
    }

    if !search.base_url.starts_with("http://") && !search.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "search.base_url must start with http:// or https://".to_string(),
        ));
    }

    if search.max_results == 0 || search.max_results > 10 {
        return Err(ConfigError::Validation(
            "search.max_results must be in range 1..=10".to_string(),
        ));
    }

    if search.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.rate_limit_window_secs == 0 || chat.rate_limit_max_messages == 0 {
        return Err(ConfigError::Validation(
            "chat.rate_limit_window_secs and chat.rate_limit_max_messages must be greater than zero"
                .to_string(),
        ));
    }

    if chat.search_cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "chat.search_cache_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if chat.history_window == 0 {
        return Err(ConfigError::Validation(
            "chat.history_window must be greater than zero".to_string(),
        ));
    }

    if chat.utc_offset_minutes.abs() >= 24 * 60 {
        return Err(ConfigError::Validation(
            "chat.utc_offset_minutes must be within one day of UTC".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.parse::<i32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    search: Option<SearchPatch>,
    chat: Option<ChatPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    enabled: Option<bool>,
    api_key: Option<String>,
    base_url: Option<String>,
    max_results: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    hotel_location: Option<String>,
    utc_offset_minutes: Option<i32>,
    rate_limit_window_secs: Option<u64>,
    rate_limit_max_messages: Option<u32>,
    search_cache_ttl_secs: Option<u64>,
    history_window: Option<usize>,
    max_tool_iterations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const KEY_VARS: &[&str] = &[
        "POSADA_LLM_API_KEY",
        "GROQ_API_KEY",
        "POSADA_SEARCH_API_KEY",
        "TAVILY_API_KEY",
        "POSADA_SEARCH_ENABLED",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(KEY_VARS);

        env::set_var("TEST_POSADA_LLM_KEY", "gsk-from-env");
        env::set_var("TEST_POSADA_TAVILY_KEY", "tvly-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("posada.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_POSADA_LLM_KEY}"

[search]
enabled = true
api_key = "${TEST_POSADA_TAVILY_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gsk-from-env")
                    == Some(true),
                "llm key should be loaded from environment",
            )?;
            ensure(
                config.search.api_key.as_ref().map(|key| key.expose_secret() == "tvly-from-env")
                    == Some(true),
                "search key should be loaded from environment",
            )?;
            ensure(config.search.enabled, "search should be enabled from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_POSADA_LLM_KEY", "TEST_POSADA_TAVILY_KEY"]);
        result
    }

    #[test]
    fn provider_key_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(KEY_VARS);

        env::set_var("GROQ_API_KEY", "gsk-alias");
        env::set_var("POSADA_LOG_LEVEL", "warn");
        env::set_var("POSADA_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gsk-alias")
                    == Some(true),
                "GROQ_API_KEY should populate llm.api_key",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["GROQ_API_KEY", "POSADA_LOG_LEVEL", "POSADA_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(KEY_VARS);

        env::set_var("POSADA_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("POSADA_LLM_API_KEY", "gsk-from-env");
        env::set_var("POSADA_CHAT_RATE_LIMIT_MAX_MESSAGES", "5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("posada.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[llm]
api_key = "gsk-from-file"
model = "llama-3.3-70b-versatile"

[chat]
hotel_location = "Miraflores, Lima"
rate_limit_max_messages = 50

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "gsk-from-env")
                    == Some(true),
                "env llm key should win over file and defaults",
            )?;
            ensure(config.llm.model == "llama-3.3-70b-versatile", "file model should win")?;
            ensure(config.chat.hotel_location == "Miraflores, Lima", "file location should win")?;
            ensure(config.chat.rate_limit_max_messages == 5, "env rate limit should win")?;
            ensure(config.chat.history_window == 10, "history window keeps its default")?;
            Ok(())
        })();

        clear_vars(&[
            "POSADA_DATABASE_URL",
            "POSADA_LLM_API_KEY",
            "POSADA_CHAT_RATE_LIMIT_MAX_MESSAGES",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(KEY_VARS);

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")?;

            let ollama = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    llm_provider: Some(LlmProvider::Ollama),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("ollama needs no key: {err}"))?;
            ensure(
                ollama.llm.endpoint() == "http://localhost:11434/v1",
                "ollama should fall back to its local endpoint",
            )?;

            let search = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    llm_provider: Some(LlmProvider::Ollama),
                    search_enabled: Some(true),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            });
            ensure(
                matches!(
                    search,
                    Err(ConfigError::Validation(ref message)) if message.contains("search.api_key")
                ),
                "enabled search without a key should be rejected",
            )
        })();

        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(KEY_VARS);

        env::set_var("POSADA_LLM_API_KEY", "gsk-test");
        env::set_var("POSADA_CHAT_HISTORY_WINDOW", "ten");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("non-numeric history window must be rejected".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. } if key == "POSADA_CHAT_HISTORY_WINDOW"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["POSADA_LLM_API_KEY", "POSADA_CHAT_HISTORY_WINDOW"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(KEY_VARS);

        env::set_var("POSADA_LLM_API_KEY", "gsk-secret-value");
        env::set_var("POSADA_SEARCH_API_KEY", "tvly-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("gsk-secret-value"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("tvly-secret-value"),
                "debug output should not contain search key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            ensure(
                config.llm.endpoint() == "https://api.groq.com/openai/v1",
                "groq endpoint should be the default",
            )?;
            Ok(())
        })();

        clear_vars(&["POSADA_LLM_API_KEY", "POSADA_SEARCH_API_KEY"]);
        result
    }
}
