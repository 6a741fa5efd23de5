mod config;
mod consumer;
mod events;
mod gateway;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::consumer::Consumer;
use crate::events::fetcher::Fetcher;
use crate::events::processor::Processor;
use crate::gateway::telegram::TelegramGateway;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::Storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,readlater=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("  Database: {}", config.storage.database_path.display());
    info!("  Batch size: {}", config.consumer.batch_size);

    // Startup failures below are fatal: nothing runs without storage or gateway
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::open(&config.storage.database_path).context("Can't connect to storage")?,
    );

    let telegram = TelegramGateway::new(&config.telegram)?;
    telegram.check_connection().await.context("Can't reach Telegram")?;
    let gateway = Arc::new(telegram);

    let cursor = if config.consumer.persist_cursor {
        storage
            .load_cursor()
            .await
            .context("Can't load fetch cursor")?
    } else {
        0
    };

    let fetcher = Fetcher::with_cursor(gateway.clone(), config.consumer.batch_size, cursor);
    let processor = Processor::new(gateway, storage.clone());
    let mut consumer = Consumer::new(fetcher, processor, storage, &config.consumer);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Shutdown requested, finishing current batch...");
            cancel.cancel();
        });
    }

    info!("Service started");
    consumer.run(cancel).await;
    info!("Service stopped");

    Ok(())
}
