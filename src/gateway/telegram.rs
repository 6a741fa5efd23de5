use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UpdateKind};
use tracing::{debug, info};

use super::{Gateway, GatewayError, IncomingMessage, RawUpdate};
use crate::config::TelegramConfig;

/// Chunk size for outbound text, kept below Telegram's 4096 char cap
const MAX_MESSAGE_LEN: usize = 4000;

/// Telegram refuses `getUpdates` limits above this
const MAX_UPDATES_LIMIT: usize = 100;

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

/// Long-polling client for the Telegram Bot API
pub struct TelegramGateway {
    bot: Bot,
    poll_timeout_secs: u32,
}

impl TelegramGateway {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // HTTP timeout must outlast the long-poll timeout
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            bot: Bot::with_client(&config.bot_token, client),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    /// Check the token against the API, returning the bot's username
    pub async fn check_connection(&self) -> Result<String, GatewayError> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| GatewayError::new("get bot info", e))?;
        let username = me.user.username.clone().unwrap_or_default();
        info!("Connected to Telegram as @{}", username);
        Ok(username)
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    async fn fetch_updates(
        &self,
        offset: i64,
        limit: usize,
    ) -> Result<Vec<RawUpdate>, GatewayError> {
        let offset = i32::try_from(offset).map_err(|e| GatewayError::new("get updates", e))?;
        let limit = limit.clamp(1, MAX_UPDATES_LIMIT) as u8;

        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .limit(limit)
            .timeout(self.poll_timeout_secs)
            .await
            .map_err(|e| GatewayError::new("get updates", e))?;

        debug!("Received {} update(s) from offset {}", updates.len(), offset);
        Ok(updates.into_iter().map(raw_update).collect())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), GatewayError> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.bot
                .send_message(ChatId(chat_id), chunk)
                .await
                .map_err(|e| GatewayError::new("send message", e))?;
        }
        Ok(())
    }
}

fn raw_update(update: Update) -> RawUpdate {
    let message = match &update.kind {
        UpdateKind::Message(msg) => incoming_message(msg),
        _ => None,
    };

    RawUpdate {
        id: i64::from(update.id.0),
        message,
    }
}

fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    let text = msg.text()?;
    let user = msg.from.as_ref()?;
    // Users without a public handle still get a private list, keyed by id
    let username = user
        .username
        .clone()
        .unwrap_or_else(|| user.id.0.to_string());

    Some(IncomingMessage {
        chat_id: msg.chat.id.0,
        text: text.to_string(),
        username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_is_not_split() {
        assert_eq!(split_message("hello", 10), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_prefers_newline_boundary() {
        let chunks = split_message("first line\nsecond line", 15);
        assert_eq!(chunks, vec!["first line\n", "second line"]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "ééééé";
        let chunks = split_message(text, 3);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 3));
    }
}
