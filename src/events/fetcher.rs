use std::sync::Arc;

use tracing::debug;

use super::Event;
use crate::gateway::{Gateway, GatewayError};

/// Pulls batches of events from the gateway and tracks the update cursor.
///
/// The cursor only moves forward: after a non-empty batch it points one past
/// the highest update id seen, so the next fetch never returns those updates
/// again. A failed fetch leaves it untouched so the retry asks for the same
/// range.
pub struct Fetcher {
    gateway: Arc<dyn Gateway>,
    batch_size: usize,
    cursor: i64,
}

impl Fetcher {
    pub fn new(gateway: Arc<dyn Gateway>, batch_size: usize) -> Self {
        Self::with_cursor(gateway, batch_size, 0)
    }

    /// Resume from a previously committed cursor
    pub fn with_cursor(gateway: Arc<dyn Gateway>, batch_size: usize, cursor: i64) -> Self {
        Self {
            gateway,
            batch_size,
            cursor,
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub async fn fetch(&mut self) -> Result<Vec<Event>, GatewayError> {
        let updates = self
            .gateway
            .fetch_updates(self.cursor, self.batch_size)
            .await?;

        let Some(max_id) = updates.iter().map(|u| u.id).max() else {
            return Ok(Vec::new());
        };

        // Updates without a text message still move the cursor
        let events: Vec<Event> = updates
            .into_iter()
            .filter_map(|u| {
                u.message.map(|m| Event {
                    id: u.id,
                    chat_id: m.chat_id,
                    text: m.text,
                    username: m.username,
                })
            })
            .collect();

        self.cursor = self.cursor.max(max_id + 1);
        debug!(
            "Fetched {} event(s), cursor now {}",
            events.len(),
            self.cursor
        );

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{text_update, ScriptedGateway};
    use crate::gateway::RawUpdate;

    fn fetcher(gateway: &Arc<ScriptedGateway>) -> Fetcher {
        Fetcher::new(gateway.clone(), 100)
    }

    #[tokio::test]
    async fn test_cursor_advances_past_highest_id() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.push_batch(vec![text_update(5, "a", "alice"), text_update(7, "b", "alice")]);
        let mut fetcher = fetcher(&gateway);

        let events = fetcher.fetch().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, 5);
        assert_eq!(events[1].id, 7);
        assert_eq!(fetcher.cursor(), 8);
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_cursor() {
        let gateway = Arc::new(ScriptedGateway::default());
        let mut fetcher = Fetcher::with_cursor(gateway.clone(), 100, 12);

        assert!(fetcher.fetch().await.unwrap().is_empty());
        assert_eq!(fetcher.cursor(), 12);
    }

    #[tokio::test]
    async fn test_error_keeps_cursor_and_retries_same_offset() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.push_batch(vec![text_update(1, "a", "alice")]);
        gateway.push_error();
        gateway.push_batch(vec![text_update(2, "b", "alice")]);
        let mut fetcher = fetcher(&gateway);

        fetcher.fetch().await.unwrap();
        assert!(fetcher.fetch().await.is_err());
        assert_eq!(fetcher.cursor(), 2);
        fetcher.fetch().await.unwrap();

        assert_eq!(*gateway.offsets.lock().unwrap(), vec![0, 2, 2]);
        assert_eq!(fetcher.cursor(), 3);
    }

    #[tokio::test]
    async fn test_batches_are_strictly_increasing() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.push_batch(vec![text_update(1, "a", "alice"), text_update(2, "b", "alice")]);
        gateway.push_batch(vec![text_update(3, "c", "bob")]);
        gateway.push_batch(vec![text_update(10, "d", "bob"), text_update(11, "e", "bob")]);
        let mut fetcher = fetcher(&gateway);

        let mut last_max = i64::MIN;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            let batch = fetcher.fetch().await.unwrap();
            let min = batch.iter().map(|e| e.id).min().unwrap();
            assert!(min > last_max);
            last_max = batch.iter().map(|e| e.id).max().unwrap();
            for e in batch {
                assert!(seen.insert(e.id));
            }
        }
        assert_eq!(*gateway.offsets.lock().unwrap(), vec![0, 3, 4]);
    }

    #[tokio::test]
    async fn test_non_message_updates_advance_cursor() {
        let gateway = Arc::new(ScriptedGateway::default());
        gateway.push_batch(vec![
            text_update(3, "hi", "alice"),
            RawUpdate {
                id: 4,
                message: None,
            },
        ]);
        let mut fetcher = fetcher(&gateway);

        let events = fetcher.fetch().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "hi");
        assert_eq!(fetcher.cursor(), 5);
    }
}
