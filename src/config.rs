use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `telegram.bot_token`
pub const TOKEN_ENV: &str = "READLATER_BOT_TOKEN";

/// Telegram refuses `getUpdates` limits above this
const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_storage_config")]
    pub storage: StorageConfig,
    #[serde(default = "default_consumer_config")]
    pub consumer: ConsumerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Long-poll timeout passed to getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause after an empty batch
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// Store the cursor after each batch and resume from it on restart
    #[serde(default = "default_persist_cursor")]
    pub persist_cursor: bool,
}

fn default_poll_timeout_secs() -> u32 {
    30
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/sqlite/storage.db")
}

fn default_batch_size() -> usize {
    100
}

fn default_idle_delay_ms() -> u64 {
    500
}

fn default_backoff_initial_ms() -> u64 {
    1000
}

fn default_backoff_max_secs() -> u64 {
    60
}

fn default_persist_cursor() -> bool {
    true
}

fn default_storage_config() -> StorageConfig {
    StorageConfig {
        database_path: default_db_path(),
    }
}

fn default_consumer_config() -> ConsumerConfig {
    ConsumerConfig {
        batch_size: default_batch_size(),
        idle_delay_ms: default_idle_delay_ms(),
        backoff_initial_ms: default_backoff_initial_ms(),
        backoff_max_secs: default_backoff_max_secs(),
        persist_cursor: default_persist_cursor(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let token_override = std::env::var(TOKEN_ENV).ok();
        Self::parse(&content, token_override)
    }

    fn parse(content: &str, token_override: Option<String>) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).context("Failed to parse config file")?;

        if let Some(token) = token_override.filter(|t| !t.trim().is_empty()) {
            config.telegram.bot_token = token;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Telegram bot token is not specified (set telegram.bot_token or {})",
                TOKEN_ENV
            );
        }

        let batch_size = self.consumer.batch_size;
        if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
            anyhow::bail!(
                "consumer.batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE,
                batch_size
            );
        }

        if self.consumer.backoff_initial_ms == 0 {
            anyhow::bail!("consumer.backoff_initial_ms must be positive");
        }

        if self.consumer.backoff_max_secs == 0 {
            anyhow::bail!("consumer.backoff_max_secs must be positive");
        }

        if self.consumer.backoff_initial_ms > self.consumer.backoff_max_secs.saturating_mul(1000) {
            anyhow::bail!(
                "consumer.backoff_initial_ms ({}) exceeds consumer.backoff_max_secs ({}s)",
                self.consumer.backoff_initial_ms,
                self.consumer.backoff_max_secs
            );
        }

        Ok(())
    }
}
