pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A text message received from the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub text: String,
    /// Sender handle, or the numeric user id when the sender has none
    pub username: String,
}

/// One entry of the gateway's update stream.
///
/// `message` is `None` for updates that carry no text message (edits,
/// stickers, callback queries). Those still count for the cursor.
#[derive(Debug, Clone)]
pub struct RawUpdate {
    pub id: i64,
    pub message: Option<IncomingMessage>,
}

/// Failure at the remote messaging boundary. Treated as transient.
#[derive(Debug, Error)]
#[error("can't {op}: {source}")]
pub struct GatewayError {
    op: &'static str,
    #[source]
    source: BoxError,
}

impl GatewayError {
    pub fn new(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }
}

/// The capability surface the bot needs from a messaging service
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetch up to `limit` updates with id >= `offset`, in delivery order.
    async fn fetch_updates(&self, offset: i64, limit: usize)
        -> Result<Vec<RawUpdate>, GatewayError>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted gateway: hands out queued fetch results, records sends
    #[derive(Default)]
    pub(crate) struct ScriptedGateway {
        pub fetches: Mutex<VecDeque<Result<Vec<RawUpdate>, GatewayError>>>,
        pub offsets: Mutex<Vec<i64>>,
        pub sent: Mutex<Vec<(i64, String)>>,
        pub fail_sends: Mutex<bool>,
    }

    impl ScriptedGateway {
        pub fn push_batch(&self, updates: Vec<RawUpdate>) {
            self.fetches.lock().unwrap().push_back(Ok(updates));
        }

        pub fn push_error(&self) {
            self.fetches.lock().unwrap().push_back(Err(GatewayError::new(
                "get updates",
                std::io::Error::other("connection reset"),
            )));
        }

        pub fn sent_texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Gateway for ScriptedGateway {
        async fn fetch_updates(
            &self,
            offset: i64,
            _limit: usize,
        ) -> Result<Vec<RawUpdate>, GatewayError> {
            self.offsets.lock().unwrap().push(offset);
            self.fetches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), GatewayError> {
            if *self.fail_sends.lock().unwrap() {
                return Err(GatewayError::new(
                    "send message",
                    std::io::Error::other("network down"),
                ));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    pub(crate) fn text_update(id: i64, text: &str, username: &str) -> RawUpdate {
        RawUpdate {
            id,
            message: Some(IncomingMessage {
                chat_id: 100,
                text: text.to_string(),
                username: username.to_string(),
            }),
        }
    }
}
