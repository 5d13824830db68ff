use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chatorder_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

/// Effective configuration with the source of every value. Secrets never leave redacted.
pub fn run(json: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    if json {
        let output = serde_json::to_string_pretty(&config.redacted())
            .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"));
        return CommandResult { exit_code: 0, output };
    }

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let api_key = match config.llm.api_key.as_ref() {
        Some(secret) if secret.expose_secret().trim().is_empty() => "<empty>",
        Some(_) => "<redacted>",
        None => "<unset>",
    };

    let entries: Vec<(&str, String, Vec<&str>)> = vec![
        ("database.url", config.database.url.clone(), vec!["CHATORDER_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            vec!["CHATORDER_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            vec!["CHATORDER_DATABASE_TIMEOUT_SECS"],
        ),
        ("llm.provider", config.llm.provider.as_str().to_string(), vec!["CHATORDER_LLM_PROVIDER"]),
        ("llm.model", config.llm.model.clone(), vec!["CHATORDER_LLM_MODEL"]),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            vec!["CHATORDER_LLM_BASE_URL"],
        ),
        ("llm.api_key", api_key.to_string(), vec!["CHATORDER_LLM_API_KEY"]),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), vec!["CHATORDER_LLM_TIMEOUT_SECS"]),
        ("llm.max_retries", config.llm.max_retries.to_string(), vec!["CHATORDER_LLM_MAX_RETRIES"]),
        (
            "extraction.confidence_threshold",
            config.extraction.confidence_threshold.to_string(),
            vec!["CHATORDER_EXTRACTION_CONFIDENCE_THRESHOLD"],
        ),
        (
            "extraction.max_turns",
            config.extraction.max_turns.to_string(),
            vec!["CHATORDER_EXTRACTION_MAX_TURNS"],
        ),
        ("extraction.top_k", config.extraction.top_k.to_string(), vec!["CHATORDER_EXTRACTION_TOP_K"]),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            vec!["CHATORDER_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), vec!["CHATORDER_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            vec!["CHATORDER_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            vec!["CHATORDER_LOGGING_LEVEL", "CHATORDER_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            vec!["CHATORDER_LOGGING_FORMAT", "CHATORDER_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in &entries {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("chatorder.toml"), PathBuf::from("config/chatorder.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
