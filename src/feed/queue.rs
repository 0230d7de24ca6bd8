//! Inbound feed queue
//!
//! Unbounded lock-free MPSC queue between feed callbacks (producers, any thread)
//! and the ingestion loop (single consumer).
//! Uses crossbeam-queue for lock-free push/pop.

use super::traits::FeedMessage;
use crossbeam_queue::SegQueue;

/// Thread-safe inbound message queue
#[derive(Debug, Default)]
pub struct FeedQueue {
    inner: SegQueue<FeedMessage>,
}

impl FeedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message (never blocks, never fails)
    #[inline]
    pub fn push(&self, message: FeedMessage) {
        self.inner.push(message);
    }

    /// Decode and enqueue a raw JSON payload
    ///
    /// Returns false if the payload could not be decoded; it is dropped.
    pub fn push_json(&self, raw: &str) -> bool {
        match FeedMessage::from_json(raw) {
            Ok(message) => {
                self.push(message);
                true
            }
            Err(e) => {
                tracing::debug!(target: "feed", "Dropping undecodable payload: {}", e);
                false
            }
        }
    }

    /// Dequeue the oldest message, if any
    #[inline]
    pub fn pop(&self) -> Option<FeedMessage> {
        self.inner.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
