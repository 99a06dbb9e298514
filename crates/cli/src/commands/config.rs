use std::env;
use std::fs;
use std::path::Path;

use concierge_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

struct Field {
    key_path: &'static str,
    env_key: &'static str,
    value: String,
}

impl Field {
    fn new(key_path: &'static str, env_key: &'static str, value: impl Into<String>) -> Self {
        Self { key_path, env_key, value: value.into() }
    }
}

pub fn run() -> CommandResult {
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

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key_path,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field::new("database.url", "CONCIERGE_DATABASE_URL", &config.database.url),
        Field::new(
            "database.max_connections",
            "CONCIERGE_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            "CONCIERGE_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        Field::new(
            "whatsapp.access_token",
            "CONCIERGE_WHATSAPP_ACCESS_TOKEN",
            redact_token(config.whatsapp.access_token.expose_secret()),
        ),
        Field::new(
            "whatsapp.phone_number_id",
            "CONCIERGE_WHATSAPP_PHONE_NUMBER_ID",
            &config.whatsapp.phone_number_id,
        ),
        Field::new(
            "whatsapp.api_version",
            "CONCIERGE_WHATSAPP_API_VERSION",
            &config.whatsapp.api_version,
        ),
        Field::new("whatsapp.base_url", "CONCIERGE_WHATSAPP_BASE_URL", &config.whatsapp.base_url),
        Field::new("llm.provider", "CONCIERGE_LLM_PROVIDER", format!("{:?}", config.llm.provider)),
        Field::new("llm.model", "CONCIERGE_LLM_MODEL", &config.llm.model),
        Field::new(
            "llm.embedding_model",
            "CONCIERGE_LLM_EMBEDDING_MODEL",
            &config.llm.embedding_model,
        ),
        Field::new(
            "llm.base_url",
            "CONCIERGE_LLM_BASE_URL",
            config.llm.base_url.as_deref().unwrap_or("<unset>"),
        ),
        Field::new("llm.api_key", "CONCIERGE_LLM_API_KEY", presence(config.llm.api_key.as_ref())),
        Field::new(
            "retrieval.rpc_url",
            "CONCIERGE_RETRIEVAL_RPC_URL",
            config.retrieval.rpc_url.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "retrieval.api_key",
            "CONCIERGE_RETRIEVAL_API_KEY",
            presence(config.retrieval.api_key.as_ref()),
        ),
        Field::new(
            "retrieval.match_count",
            "CONCIERGE_RETRIEVAL_MATCH_COUNT",
            config.retrieval.match_count.to_string(),
        ),
        Field::new(
            "retrieval.similarity_threshold",
            "CONCIERGE_RETRIEVAL_SIMILARITY_THRESHOLD",
            config.retrieval.similarity_threshold.to_string(),
        ),
        Field::new(
            "session.max_turns",
            "CONCIERGE_SESSION_MAX_TURNS",
            config.session.max_turns.to_string(),
        ),
        Field::new(
            "session.ttl_secs",
            "CONCIERGE_SESSION_TTL_SECS",
            config.session.ttl_secs.to_string(),
        ),
        Field::new(
            "escalation.webhook_url",
            "CONCIERGE_ESCALATION_WEBHOOK_URL",
            config.escalation.webhook_url.as_deref().unwrap_or("<unset>"),
        ),
        Field::new(
            "escalation.webhook_secret",
            "CONCIERGE_ESCALATION_WEBHOOK_SECRET",
            presence(config.escalation.webhook_secret.as_ref()),
        ),
        Field::new(
            "escalation.confidence_threshold",
            "CONCIERGE_ESCALATION_CONFIDENCE_THRESHOLD",
            config.escalation.confidence_threshold.to_string(),
        ),
        Field::new(
            "resilience.retry_attempts",
            "CONCIERGE_RESILIENCE_RETRY_ATTEMPTS",
            config.resilience.retry_attempts.to_string(),
        ),
        Field::new(
            "resilience.backoff_ms",
            "CONCIERGE_RESILIENCE_BACKOFF_MS",
            config.resilience.backoff_ms.to_string(),
        ),
        Field::new(
            "resilience.lookup_timeout_ms",
            "CONCIERGE_RESILIENCE_LOOKUP_TIMEOUT_MS",
            config.resilience.lookup_timeout_ms.to_string(),
        ),
        Field::new(
            "resilience.critical_timeout_ms",
            "CONCIERGE_RESILIENCE_CRITICAL_TIMEOUT_MS",
            config.resilience.critical_timeout_ms.to_string(),
        ),
        Field::new(
            "server.bind_address",
            "CONCIERGE_SERVER_BIND_ADDRESS",
            &config.server.bind_address,
        ),
        Field::new("server.port", "CONCIERGE_SERVER_PORT", config.server.port.to_string()),
        Field::new(
            "server.graceful_shutdown_secs",
            "CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        Field::new("logging.level", "CONCIERGE_LOGGING_LEVEL", &config.logging.level),
        Field::new(
            "logging.format",
            "CONCIERGE_LOGGING_FORMAT",
            format!("{:?}", config.logging.format),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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

fn presence(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("EAAG-secret-value"), "EAAG-***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("   "), "<empty>");
    }

    #[test]
    fn dotted_paths_walk_nested_tables() {
        let doc: toml::Value =
            "[llm]\nmodel = \"gpt-4o-mini\"\n".parse().expect("toml should parse");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
