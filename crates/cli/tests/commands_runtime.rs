use std::env;
use std::sync::{Mutex, OnceLock};

use posada_cli::commands::{config, migrate, seed};
use serde_json::Value;

const VALID_ENV: &[(&str, &str)] =
    &[("POSADA_LLM_API_KEY", "gsk-test"), ("POSADA_DATABASE_URL", "sqlite::memory:")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_llm_key() {
    with_env(&[("POSADA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or_default().contains("llm.api_key"));
    });
}

#[test]
fn seed_loads_and_verifies_the_demo_hotel() {
    with_env(VALID_ENV, || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected deterministic seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("11 rooms"));
        assert!(message.contains("Individual, Matrimonial, Triple, Familiar, Doble, Suite"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(VALID_ENV, || {
        let first = seed::run();
        let second = seed::run();
        assert_eq!(first.exit_code, 0);
        assert_eq!(second.exit_code, 0);
        assert_eq!(parse_payload(&first.output)["message"], parse_payload(&second.output)["message"]);
    });
}

#[test]
fn seed_rejects_non_sqlite_urls() {
    with_env(
        &[("POSADA_LLM_API_KEY", "gsk-test"), ("POSADA_DATABASE_URL", "postgres://localhost/hotel")],
        || {
            let result = seed::run();
            assert_eq!(result.exit_code, 2);
            assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
        },
    );
}

#[test]
fn config_attributes_sources_and_redacts_keys() {
    with_env(
        &[
            ("POSADA_LLM_API_KEY", "gsk-supersecret"),
            ("POSADA_DATABASE_URL", "sqlite::memory:"),
            ("POSADA_CHAT_HOTEL_LOCATION", "Arequipa, Perú"),
        ],
        || {
            let output = config::run();
            assert!(output.starts_with("effective config"));
            assert!(output.contains("- chat.hotel_location = Arequipa, Perú (source: env (POSADA_CHAT_HOTEL_LOCATION))"));
            assert!(output.contains("- llm.api_key = gsk-*** (source: env (POSADA_LLM_API_KEY))"));
            assert!(output.contains("- llm.model = llama-3.1-8b-instant (source: default)"));
            assert!(!output.contains("supersecret"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "POSADA_DATABASE_URL",
        "POSADA_DATABASE_MAX_CONNECTIONS",
        "POSADA_DATABASE_TIMEOUT_SECS",
        "POSADA_LLM_PROVIDER",
        "POSADA_LLM_API_KEY",
        "GROQ_API_KEY",
        "POSADA_LLM_BASE_URL",
        "POSADA_LLM_MODEL",
        "POSADA_LLM_TIMEOUT_SECS",
        "POSADA_SEARCH_ENABLED",
        "POSADA_SEARCH_API_KEY",
        "TAVILY_API_KEY",
        "POSADA_CHAT_HOTEL_LOCATION",
        "POSADA_SERVER_BIND_ADDRESS",
        "POSADA_SERVER_PORT",
        "POSADA_LOGGING_LEVEL",
        "POSADA_LOGGING_FORMAT",
        "POSADA_LOG_LEVEL",
        "POSADA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
