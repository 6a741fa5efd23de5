use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ConsumerConfig;
use crate::events::fetcher::Fetcher;
use crate::events::processor::Processor;
use crate::events::Event;
use crate::storage::Storage;

/// Drives the fetch -> dispatch cycle until cancelled.
///
/// Strictly sequential: one event is fully handled (storage mutation and
/// reply) before the next one starts. Cancellation is only observed between
/// batches or while waiting, never in the middle of an event.
pub struct Consumer {
    fetcher: Fetcher,
    processor: Processor,
    storage: Arc<dyn Storage>,
    persist_cursor: bool,
    idle_delay: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
}

impl Consumer {
    pub fn new(
        fetcher: Fetcher,
        processor: Processor,
        storage: Arc<dyn Storage>,
        config: &ConsumerConfig,
    ) -> Self {
        Self {
            fetcher,
            processor,
            storage,
            persist_cursor: config.persist_cursor,
            idle_delay: Duration::from_millis(config.idle_delay_ms),
            backoff_initial: Duration::from_millis(config.backoff_initial_ms),
            backoff_max: Duration::from_secs(config.backoff_max_secs),
        }
    }

    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(self.backoff_initial, self.backoff_max);

        info!("Consumer started at cursor {}", self.fetcher.cursor());

        loop {
            let cursor_before = self.fetcher.cursor();
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                fetched = self.fetcher.fetch() => fetched,
            };

            let events = match fetched {
                Ok(events) => {
                    backoff.reset();
                    events
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!("Failed to fetch events: {}", e);
                    warn!("Retrying in {:?}", delay);
                    if !sleep_or_cancel(&cancel, delay).await {
                        break;
                    }
                    continue;
                }
            };

            if !events.is_empty() {
                self.dispatch(&events).await;
            }

            // Batches of only non-message updates move the cursor too
            if self.fetcher.cursor() != cursor_before {
                self.commit_cursor().await;
            }

            if events.is_empty() && !sleep_or_cancel(&cancel, self.idle_delay).await {
                break;
            }
        }

        info!("Consumer stopped at cursor {}", self.fetcher.cursor());
    }

    /// Process a batch in order. A failing event is logged and skipped.
    async fn dispatch(&self, events: &[Event]) {
        for event in events {
            if let Err(e) = self.processor.process(event).await {
                error!("Failed to handle update {}: {}", event.id, e);
            }
        }
    }

    async fn commit_cursor(&self) {
        if !self.persist_cursor {
            return;
        }
        if let Err(e) = self.storage.save_cursor(self.fetcher.cursor()).await {
            warn!("Failed to persist cursor {}: {}", self.fetcher.cursor(), e);
        }
    }
}

/// Exponential retry delay: starts at `initial`, doubles, never exceeds `max`
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Returns false when cancelled before the delay elapsed
async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
