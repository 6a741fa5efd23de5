//! readlater setup wizard.
//!
//! Asks for the bot token, database path and batch size on the terminal and
//! writes `config.toml` to the project root (`READLATER_ROOT`, default cwd).

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;

struct ConfigParams<'a> {
    tg_token: &'a str,
    db_path: &'a str,
    batch_size: usize,
    persist_cursor: bool,
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let token_line = if p.tg_token.is_empty() {
        "# bot_token = \"123456:ABC...\"  # or set READLATER_BOT_TOKEN".to_owned()
    } else {
        format!("bot_token = {}", toml_string(p.tg_token))
    };

    let db_path = toml_string(p.db_path);
    let batch_size = p.batch_size;
    let persist_cursor = p.persist_cursor;

    format!(
        r#"[telegram]
{token_line}
poll_timeout_secs = 30

[storage]
database_path = {db_path}

[consumer]
batch_size = {batch_size}
idle_delay_ms = 500
backoff_initial_ms = 1000
backoff_max_secs = 60
persist_cursor = {persist_cursor}
"#
    )
}

/// Quote and escape a value as a TOML basic string
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_owned()).to_string()
}

fn parse_batch_size(input: &str) -> Result<usize> {
    if input.is_empty() {
        return Ok(100);
    }
    let size: usize = input
        .parse()
        .with_context(|| format!("Batch size is not a number: {input}"))?;
    if !(1..=100).contains(&size) {
        anyhow::bail!("Batch size must be between 1 and 100, got {size}");
    }
    Ok(size)
}

fn main() -> Result<()> {
    let project_root =
        PathBuf::from(std::env::var("READLATER_ROOT").unwrap_or_else(|_| ".".to_string()));

    println!("=== readlater setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let or_default = |s: String, default: &str| {
        if s.is_empty() {
            default.to_owned()
        } else {
            s
        }
    };

    let tg_token = read_line("Telegram bot token (empty to use READLATER_BOT_TOKEN): ")?;
    let db_path = or_default(
        read_line("Database path [data/sqlite/storage.db]: ")?,
        "data/sqlite/storage.db",
    );
    let batch_size = parse_batch_size(&read_line("Batch size [100]: ")?)?;
    let persist_cursor = !matches!(
        read_line("Resume from last update after restart? [Y/n]: ")?
            .to_lowercase()
            .as_str(),
        "n" | "no"
    );

    let config = format_config(&ConfigParams {
        tg_token: &tg_token,
        db_path: &db_path,
        batch_size,
        persist_cursor,
    });

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the bot with:  cargo run --bin readlater");
    Ok(())
}
