use std::sync::Arc;

use concierge_agent::{ConversationRuntime, RuntimeCollaborators};
use concierge_core::config::AppConfig;
use concierge_db::{
    connect_with_settings, migrations, DbPool, SqlAnalyticsSink, SqlCatalog, SqlOrderDirectory,
    SqlSessionCache,
};
use thiserror::Error;
use tracing::info;

use crate::adapters::openai::OpenAiCompatibleClient;
use crate::adapters::vector_search::RpcVectorSearch;
use crate::adapters::webhook::WebhookNotifier;
use crate::adapters::whatsapp::WhatsAppMessenger;
use crate::adapters::http_client;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<ConversationRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client initialization failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = ?config.llm.provider,
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let client = http_client().map_err(BootstrapError::HttpClient)?;
    let llm = Arc::new(OpenAiCompatibleClient::from_config(&config.llm, client.clone()));
    let messenger = Arc::new(WhatsAppMessenger::from_config(&config.whatsapp, client.clone()));
    let collaborators = RuntimeCollaborators {
        session_cache: Arc::new(SqlSessionCache::new(db_pool.clone())),
        llm: llm.clone(),
        embeddings: llm.clone(),
        vector_search: Arc::new(RpcVectorSearch::from_config(&config.retrieval, client.clone())),
        notifier: Arc::new(WebhookNotifier::from_config(&config.escalation, client.clone())),
        outbound: messenger.clone(),
        orders: Arc::new(SqlOrderDirectory::new(db_pool.clone())),
        catalog: Arc::new(SqlCatalog::new(db_pool.clone())),
        analytics: Arc::new(SqlAnalyticsSink::new(db_pool.clone())),
        media: messenger,
        vision: llm,
    };

    if config.retrieval.rpc_url.is_none() {
        info!(
            event_name = "system.bootstrap.retrieval_disabled",
            correlation_id = "bootstrap",
            "no retrieval endpoint configured, answers will run without knowledge context"
        );
    }
    if config.escalation.webhook_url.is_none() {
        info!(
            event_name = "system.bootstrap.escalation_webhook_disabled",
            correlation_id = "bootstrap",
            "no escalation webhook configured, hand-offs will only be logged"
        );
    }

    let runtime = Arc::new(ConversationRuntime::from_config(&config, collaborators));
    Ok(Application { config, db_pool, runtime })
}
