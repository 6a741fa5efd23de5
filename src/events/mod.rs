pub mod fetcher;
pub mod processor;

use url::Url;

pub const RND_CMD: &str = "/rnd";
pub const HELP_CMD: &str = "/help";
pub const START_CMD: &str = "/start";

/// A normalized inbound message, ready for processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Gateway-assigned update id
    pub id: i64,
    pub chat_id: i64,
    pub text: String,
    pub username: String,
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Save(String),
    Random,
    Help,
    Start,
    Unknown,
}

impl Command {
    /// Classify message text. URLs win over command tokens.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if is_url(text) {
            return Command::Save(text.to_string());
        }

        match text {
            RND_CMD => Command::Random,
            HELP_CMD => Command::Help,
            START_CMD => Command::Start,
            _ => Command::Unknown,
        }
    }
}

fn is_url(text: &str) -> bool {
    Url::parse(text)
        .ok()
        .and_then(|u| u.host_str().map(|h| !h.is_empty()))
        .unwrap_or(false)
}
