use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::{Command, Event};
use crate::gateway::{Gateway, GatewayError};
use crate::storage::{Page, Storage, StorageError};

const MSG_HELP: &str = "I can keep your pages. I can also offer you one to read.\n\n\
    To save a page, just send me a link to it.\n\n\
    To get a random page from your list, send /rnd.\n\
    Caution! After that, the page will be removed from your list!";

const MSG_HELLO: &str = "Hi there! 👾\n\n";

const MSG_UNKNOWN_COMMAND: &str = "Unknown command 🤔";
const MSG_NO_SAVED_PAGES: &str = "You have no saved pages 🙊";
const MSG_SAVED: &str = "Saved! 👌";
const MSG_ALREADY_EXISTS: &str = "You already have this page in your list 🤗";

/// A command failed. Carries the command name and the root cause.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("can't do command: {op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("can't do command: {op}: {source}")]
    Gateway {
        op: &'static str,
        #[source]
        source: GatewayError,
    },
}

/// Turns events into commands and carries them out.
///
/// Each event causes at most one storage mutation and one outbound reply.
/// Nothing is kept between calls.
pub struct Processor {
    gateway: Arc<dyn Gateway>,
    storage: Arc<dyn Storage>,
}

impl Processor {
    pub fn new(gateway: Arc<dyn Gateway>, storage: Arc<dyn Storage>) -> Self {
        Self { gateway, storage }
    }

    pub async fn process(&self, event: &Event) -> Result<(), ProcessError> {
        let command = Command::parse(&event.text);
        info!(
            "Got command {:?} from '{}' (update {})",
            command, event.username, event.id
        );

        match command {
            Command::Save(url) => self.save_page(event, url).await,
            Command::Random => self.send_random(event).await,
            Command::Help => self.reply(event, "send help", MSG_HELP).await,
            Command::Start => {
                let text = format!("{MSG_HELLO}{MSG_HELP}");
                self.reply(event, "send hello", &text).await
            }
            Command::Unknown => {
                self.reply(event, "send unknown command", MSG_UNKNOWN_COMMAND)
                    .await
            }
        }
    }

    async fn save_page(&self, event: &Event, url: String) -> Result<(), ProcessError> {
        const OP: &str = "save page";
        let page = Page::new(url, event.username.as_str());

        let exists = self
            .storage
            .exists(&page)
            .await
            .map_err(|source| ProcessError::Storage { op: OP, source })?;

        if exists {
            debug!("Page {} already saved for {}", page.url, page.owner);
            return self.reply(event, OP, MSG_ALREADY_EXISTS).await;
        }

        self.storage
            .save(&page)
            .await
            .map_err(|source| ProcessError::Storage { op: OP, source })?;

        self.reply(event, OP, MSG_SAVED).await
    }

    async fn send_random(&self, event: &Event) -> Result<(), ProcessError> {
        const OP: &str = "send random page";

        let page = match self.storage.pick_random(&event.username).await {
            Ok(page) => page,
            Err(StorageError::NotFound) => {
                debug!("No saved pages for {}", event.username);
                return self.reply(event, OP, MSG_NO_SAVED_PAGES).await;
            }
            Err(source) => return Err(ProcessError::Storage { op: OP, source }),
        };

        // Remove only once the url is delivered, so a failed send keeps the page
        self.reply(event, OP, &page.url).await?;

        self.storage
            .remove(&page)
            .await
            .map_err(|source| ProcessError::Storage { op: OP, source })
    }

    async fn reply(
        &self,
        event: &Event,
        op: &'static str,
        text: &str,
    ) -> Result<(), ProcessError> {
        self.gateway
            .send_message(event.chat_id, text)
            .await
            .map_err(|source| ProcessError::Gateway { op, source })
    }
}
