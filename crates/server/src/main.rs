mod adapters;
mod bootstrap;
mod ingress;

use std::time::Duration;

use anyhow::Result;
use concierge_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

use crate::ingress::IngressState;

fn init_logging(config: &AppConfig) {
    use concierge_core::config::LogFormat::*;

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging needs the loaded config, so it comes up before bootstrap.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let grace_period = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let state = IngressState { runtime: app.runtime.clone(), db_pool: app.db_pool.clone() };

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        port = app.config.server.port,
        "concierge-server started"
    );

    ingress::serve(&app.config.server.bind_address, app.config.server.port, state, shutdown_signal())
        .await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_period_secs = grace_period.as_secs(),
        "concierge-server stopping, letting in-flight turns finish"
    );
    // Spawned turns are not tracked; give them the grace period to finish.
    tokio::time::sleep(grace_period).await;
    app.db_pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
