use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    pub escalation: EscalationConfig,
    pub resilience: ResilienceConfig,
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
pub struct WhatsAppConfig {
    pub access_token: SecretString,
    pub phone_number_id: String,
    pub api_version: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    /// Vector search RPC endpoint. Retrieval degrades to no context when unset.
    pub rpc_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub match_count: usize,
    pub similarity_threshold: f64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub max_turns: usize,
    pub ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EscalationConfig {
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<SecretString>,
    pub confidence_threshold: f64,
}

#[derive(Clone, Debug)]
pub struct ResilienceConfig {
    pub retry_attempts: u32,
    pub backoff_ms: u64,
    pub lookup_timeout_ms: u64,
    pub critical_timeout_ms: u64,
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
    OpenAi,
    Ollama,
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
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_phone_number_id: Option<String>,
    pub escalation_webhook_url: Option<String>,
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
                url: "sqlite://concierge.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            whatsapp: WhatsAppConfig {
                access_token: String::new().into(),
                phone_number_id: String::new(),
                api_version: "v18.0".to_string(),
                base_url: "https://graph.facebook.com".to_string(),
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o".to_string(),
                embedding_model: "text-embedding-3-small".to_string(),
                max_tokens: 500,
                temperature: 0.7,
            },
            retrieval: RetrievalConfig {
                rpc_url: None,
                api_key: None,
                match_count: 3,
                similarity_threshold: 0.7,
            },
            session: SessionConfig { max_turns: 10, ttl_secs: 86_400 },
            escalation: EscalationConfig {
                webhook_url: None,
                webhook_secret: None,
                confidence_threshold: 0.70,
            },
            resilience: ResilienceConfig {
                retry_attempts: 1,
                backoff_ms: 100,
                lookup_timeout_ms: 3_000,
                critical_timeout_ms: 5_000,
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

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
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
        let config = Self::layered(options)?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as [`AppConfig::load`], validating only the sections a
    /// database-only command reads. Messaging and model credentials may be absent.
    pub fn load_for_storage(options: LoadOptions) -> Result<Self, ConfigError> {
        let config = Self::layered(options)?;
        config.validate_storage()?;
        Ok(config)
    }

    fn layered(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("concierge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
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

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(access_token) = whatsapp.access_token {
                self.whatsapp.access_token = secret_value(access_token);
            }
            if let Some(phone_number_id) = whatsapp.phone_number_id {
                self.whatsapp.phone_number_id = phone_number_id;
            }
            if let Some(api_version) = whatsapp.api_version {
                self.whatsapp.api_version = api_version;
            }
            if let Some(base_url) = whatsapp.base_url {
                self.whatsapp.base_url = base_url;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(embedding_model) = llm.embedding_model {
                self.llm.embedding_model = embedding_model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(rpc_url) = retrieval.rpc_url {
                self.retrieval.rpc_url = Some(rpc_url);
            }
            if let Some(api_key) = retrieval.api_key {
                self.retrieval.api_key = Some(secret_value(api_key));
            }
            if let Some(match_count) = retrieval.match_count {
                self.retrieval.match_count = match_count;
            }
            if let Some(similarity_threshold) = retrieval.similarity_threshold {
                self.retrieval.similarity_threshold = similarity_threshold;
            }
        }

        if let Some(session) = patch.session {
            if let Some(max_turns) = session.max_turns {
                self.session.max_turns = max_turns;
            }
            if let Some(ttl_secs) = session.ttl_secs {
                self.session.ttl_secs = ttl_secs;
            }
        }

        if let Some(escalation) = patch.escalation {
            if let Some(webhook_url) = escalation.webhook_url {
                self.escalation.webhook_url = Some(webhook_url);
            }
            if let Some(webhook_secret) = escalation.webhook_secret {
                self.escalation.webhook_secret = Some(secret_value(webhook_secret));
            }
            if let Some(confidence_threshold) = escalation.confidence_threshold {
                self.escalation.confidence_threshold = confidence_threshold;
            }
        }

        if let Some(resilience) = patch.resilience {
            if let Some(retry_attempts) = resilience.retry_attempts {
                self.resilience.retry_attempts = retry_attempts;
            }
            if let Some(backoff_ms) = resilience.backoff_ms {
                self.resilience.backoff_ms = backoff_ms;
            }
            if let Some(lookup_timeout_ms) = resilience.lookup_timeout_ms {
                self.resilience.lookup_timeout_ms = lookup_timeout_ms;
            }
            if let Some(critical_timeout_ms) = resilience.critical_timeout_ms {
                self.resilience.critical_timeout_ms = critical_timeout_ms;
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
        if let Some(value) = read_env("CONCIERGE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("CONCIERGE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("CONCIERGE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = secret_value(value);
        }
        if let Some(value) = read_env("CONCIERGE_WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = value;
        }
        if let Some(value) = read_env("CONCIERGE_WHATSAPP_API_VERSION") {
            self.whatsapp.api_version = value;
        }
        if let Some(value) = read_env("CONCIERGE_WHATSAPP_BASE_URL") {
            self.whatsapp.base_url = value;
        }

        if let Some(value) = read_env("CONCIERGE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_env("CONCIERGE_LLM_MAX_TOKENS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_env("CONCIERGE_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_RETRIEVAL_RPC_URL") {
            self.retrieval.rpc_url = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_RETRIEVAL_API_KEY") {
            self.retrieval.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_RETRIEVAL_MATCH_COUNT") {
            self.retrieval.match_count = parse_env("CONCIERGE_RETRIEVAL_MATCH_COUNT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_RETRIEVAL_SIMILARITY_THRESHOLD") {
            self.retrieval.similarity_threshold =
                parse_env("CONCIERGE_RETRIEVAL_SIMILARITY_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_SESSION_MAX_TURNS") {
            self.session.max_turns = parse_env("CONCIERGE_SESSION_MAX_TURNS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_env("CONCIERGE_SESSION_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_ESCALATION_WEBHOOK_URL") {
            self.escalation.webhook_url = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_ESCALATION_WEBHOOK_SECRET") {
            self.escalation.webhook_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_ESCALATION_CONFIDENCE_THRESHOLD") {
            self.escalation.confidence_threshold =
                parse_env("CONCIERGE_ESCALATION_CONFIDENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_RESILIENCE_RETRY_ATTEMPTS") {
            self.resilience.retry_attempts =
                parse_env("CONCIERGE_RESILIENCE_RETRY_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_RESILIENCE_BACKOFF_MS") {
            self.resilience.backoff_ms = parse_env("CONCIERGE_RESILIENCE_BACKOFF_MS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_RESILIENCE_LOOKUP_TIMEOUT_MS") {
            self.resilience.lookup_timeout_ms =
                parse_env("CONCIERGE_RESILIENCE_LOOKUP_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_RESILIENCE_CRITICAL_TIMEOUT_MS") {
            self.resilience.critical_timeout_ms =
                parse_env("CONCIERGE_RESILIENCE_CRITICAL_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_PORT") {
            self.server.port = parse_env("CONCIERGE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("CONCIERGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
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
        if let Some(access_token) = overrides.whatsapp_access_token {
            self.whatsapp.access_token = secret_value(access_token);
        }
        if let Some(phone_number_id) = overrides.whatsapp_phone_number_id {
            self.whatsapp.phone_number_id = phone_number_id;
        }
        if let Some(webhook_url) = overrides.escalation_webhook_url {
            self.escalation.webhook_url = Some(webhook_url);
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_whatsapp(&self.whatsapp)?;
        validate_llm(&self.llm)?;
        validate_retrieval(&self.retrieval)?;
        validate_session(&self.session)?;
        validate_escalation(&self.escalation)?;
        validate_resilience(&self.resilience)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    pub fn validate_storage(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_session(&self.session)?;
        validate_resilience(&self.resilience)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("concierge.toml"), PathBuf::from("config/concierge.toml")]
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

fn validate_whatsapp(whatsapp: &WhatsAppConfig) -> Result<(), ConfigError> {
    if whatsapp.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "whatsapp.access_token is required. Get it from Meta for Developers > Your App > WhatsApp > API Setup".to_string(),
        ));
    }

    if whatsapp.phone_number_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "whatsapp.phone_number_id is required (the sender phone number id, not the phone number itself)".to_string(),
        ));
    }

    if !whatsapp.phone_number_id.trim().chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ConfigError::Validation(
            "whatsapp.phone_number_id must be numeric".to_string(),
        ));
    }

    validate_http_url("whatsapp.base_url", &whatsapp.base_url)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.max_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_tokens must be greater than zero".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        validate_http_url("llm.base_url", base_url)?;
    }

    Ok(())
}

fn validate_retrieval(retrieval: &RetrievalConfig) -> Result<(), ConfigError> {
    if retrieval.match_count == 0 {
        return Err(ConfigError::Validation(
            "retrieval.match_count must be greater than zero".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&retrieval.similarity_threshold) {
        return Err(ConfigError::Validation(
            "retrieval.similarity_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    if let Some(rpc_url) = &retrieval.rpc_url {
        validate_http_url("retrieval.rpc_url", rpc_url)?;
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.max_turns == 0 {
        return Err(ConfigError::Validation(
            "session.max_turns must be greater than zero".to_string(),
        ));
    }

    if session.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_escalation(escalation: &EscalationConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&escalation.confidence_threshold) {
        return Err(ConfigError::Validation(
            "escalation.confidence_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }

    if let Some(webhook_url) = &escalation.webhook_url {
        validate_http_url("escalation.webhook_url", webhook_url)?;
    }

    Ok(())
}

fn validate_resilience(resilience: &ResilienceConfig) -> Result<(), ConfigError> {
    if resilience.retry_attempts > 5 {
        return Err(ConfigError::Validation(
            "resilience.retry_attempts must be at most 5".to_string(),
        ));
    }

    if resilience.lookup_timeout_ms == 0 || resilience.critical_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "resilience timeouts must be greater than zero".to_string(),
        ));
    }

    if resilience.backoff_ms > 10_000 {
        return Err(ConfigError::Validation(
            "resilience.backoff_ms must be at most 10000".to_string(),
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

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    whatsapp: Option<WhatsAppPatch>,
    llm: Option<LlmPatch>,
    retrieval: Option<RetrievalPatch>,
    session: Option<SessionPatch>,
    escalation: Option<EscalationPatch>,
    resilience: Option<ResiliencePatch>,
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
struct WhatsAppPatch {
    access_token: Option<String>,
    phone_number_id: Option<String>,
    api_version: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalPatch {
    rpc_url: Option<String>,
    api_key: Option<String>,
    match_count: Option<usize>,
    similarity_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    max_turns: Option<usize>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EscalationPatch {
    webhook_url: Option<String>,
    webhook_secret: Option<String>,
    confidence_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResiliencePatch {
    retry_attempts: Option<u32>,
    backoff_ms: Option<u64>,
    lookup_timeout_ms: Option<u64>,
    critical_timeout_ms: Option<u64>,
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
