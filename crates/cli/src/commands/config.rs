use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use posada_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One effective setting: dotted key, rendered value, environment variables that can set it.
struct Setting {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Setting {
    fn new(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for setting in settings(&config) {
        let source = field_source(&setting, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", setting.key, setting.value));
    }
    lines.join("\n")
}

fn settings(config: &AppConfig) -> Vec<Setting> {
    vec![
        Setting::new("database.url", &config.database.url, &["POSADA_DATABASE_URL"]),
        Setting::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["POSADA_DATABASE_MAX_CONNECTIONS"],
        ),
        Setting::new("llm.provider", config.llm.provider.as_str(), &["POSADA_LLM_PROVIDER"]),
        Setting::new("llm.model", &config.llm.model, &["POSADA_LLM_MODEL"]),
        Setting::new("llm.base_url", config.llm.endpoint(), &["POSADA_LLM_BASE_URL"]),
        Setting::new(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref()),
            &["POSADA_LLM_API_KEY", "GROQ_API_KEY"],
        ),
        Setting::new(
            "llm.temperature",
            config.llm.temperature.to_string(),
            &["POSADA_LLM_TEMPERATURE"],
        ),
        Setting::new("llm.max_tokens", config.llm.max_tokens.to_string(), &["POSADA_LLM_MAX_TOKENS"]),
        Setting::new("search.enabled", config.search.enabled.to_string(), &["POSADA_SEARCH_ENABLED"]),
        Setting::new(
            "search.api_key",
            redact_secret(config.search.api_key.as_ref()),
            &["POSADA_SEARCH_API_KEY", "TAVILY_API_KEY"],
        ),
        Setting::new(
            "chat.hotel_location",
            &config.chat.hotel_location,
            &["POSADA_CHAT_HOTEL_LOCATION"],
        ),
        Setting::new(
            "chat.rate_limit_max_messages",
            format!(
                "{} per {}s",
                config.chat.rate_limit_max_messages, config.chat.rate_limit_window_secs
            ),
            &["POSADA_CHAT_RATE_LIMIT_MAX_MESSAGES", "POSADA_CHAT_RATE_LIMIT_WINDOW_SECS"],
        ),
        Setting::new(
            "chat.history_window",
            config.chat.history_window.to_string(),
            &["POSADA_CHAT_HISTORY_WINDOW"],
        ),
        Setting::new(
            "server.bind_address",
            &config.server.bind_address,
            &["POSADA_SERVER_BIND_ADDRESS"],
        ),
        Setting::new("server.port", config.server.port.to_string(), &["POSADA_SERVER_PORT"]),
        Setting::new(
            "logging.level",
            &config.logging.level,
            &["POSADA_LOGGING_LEVEL", "POSADA_LOG_LEVEL"],
        ),
        Setting::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["POSADA_LOGGING_FORMAT", "POSADA_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("posada.toml"), PathBuf::from("config/posada.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    setting: &Setting,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = setting.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, setting.key)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret.map(|value| value.expose_secret().trim().to_string()) {
        None => "<unset>".to_string(),
        Some(value) if value.is_empty() => "<empty>".to_string(),
        Some(value) => match value.split_once('-') {
            Some((prefix, _)) if prefix.len() <= 5 => format!("{prefix}-***"),
            _ => "<redacted>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_never_render_in_full() {
        let groq = SecretString::from("gsk-abcdef123456".to_string());
        assert_eq!(redact_secret(Some(&groq)), "gsk-***");

        let opaque = SecretString::from("abcdef123456".to_string());
        assert_eq!(redact_secret(Some(&opaque)), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file() {
        let doc: Value = "[chat]\nhotel_location = \"Cusco\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "chat.hotel_location"));
        assert!(!contains_path(&doc, "chat.history_window"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
