//! Ingestion loop
//!
//! Drains a bounded number of inbound messages per cycle and applies quote
//! updates to the store. Order reports, broker errors and transport exceptions
//! are consumed and counted but not processed here.

use super::queue::FeedQueue;
use super::traits::FeedMessage;
use crate::core::MarketStateStore;
use crate::infrastructure::metrics::MetricsCollector;
use std::sync::Arc;

/// Default per-cycle drain bound
pub const DEFAULT_DRAIN_LIMIT: usize = 4000;

/// Single consumer of the feed queue
pub struct Ingestor {
    /// `None` until the feed is connected
    queue: Option<Arc<FeedQueue>>,
    metrics: Arc<MetricsCollector>,
}

impl Ingestor {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self {
            queue: None,
            metrics,
        }
    }

    /// Start consuming from `queue`
    pub fn attach(&mut self, queue: Arc<FeedQueue>) {
        self.queue = Some(queue);
    }

    /// Stop consuming; subsequent drains are no-ops
    pub fn detach(&mut self) {
        self.queue = None;
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.queue.is_some()
    }

    /// Pop up to `max_messages` and apply quote updates to `store`
    ///
    /// Returns the number of messages popped, which is less than `max_messages`
    /// when the queue empties first. Returns 0 when no queue is attached.
    pub fn drain(&self, store: &mut MarketStateStore, max_messages: usize) -> usize {
        let Some(queue) = self.queue.as_ref() else {
            return 0;
        };

        let mut pulled = 0;
        while pulled < max_messages {
            let Some(message) = queue.pop() else {
                break;
            };
            pulled += 1;
            self.metrics.record_message(message.kind());

            match message {
                FeedMessage::MarketData(payload) => {
                    if let Some(update) = payload.into_update() {
                        store.apply(&update);
                        self.metrics.record_quote_applied();
                    }
                }
                FeedMessage::OrderReport(report) => {
                    tracing::debug!(target: "ingest", "Order report ignored: {}", report);
                }
                FeedMessage::Error(error) => {
                    tracing::warn!(target: "ingest", "Feed error notice: {}", error);
                }
                FeedMessage::Exception(message) => {
                    tracing::warn!(target: "ingest", "Feed transport exception: {}", message);
                }
            }
        }

        pulled
    }
}
