//! Feed abstraction
//!
//! `FeedMessage` is what producers push onto the queue. `MarketDataFeed` is the thin
//! interface the engine uses to talk to the upstream broker (connect, subscribe,
//! unsubscribe); the transport behind it is not part of this crate's core.

use super::parsing::MarketDataPayload;
use super::queue::FeedQueue;
use crate::{DeskError, Result};
use serde::Deserialize;
use std::sync::Arc;

/// Inbound message, tagged by the producer
///
/// Wire form: `{"type": "marketData" | "orderReport" | "error" | "exception", "data": …}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedMessage {
    /// Quote update for one instrument
    #[serde(rename = "marketData")]
    MarketData(MarketDataPayload),
    /// Order acknowledgement (not processed by the desk)
    #[serde(rename = "orderReport")]
    OrderReport(serde_json::Value),
    /// Error notice from the broker
    #[serde(rename = "error")]
    Error(serde_json::Value),
    /// Transport exception raised by the client library
    #[serde(rename = "exception")]
    Exception(String),
}

/// Message classification for metrics and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    MarketData,
    OrderReport,
    Error,
    Exception,
}

impl FeedMessage {
    /// Decode one JSON payload
    ///
    /// # Errors
    /// Returns `DeskError::Parse` for unknown tags or malformed bodies.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| DeskError::Parse(e.to_string()))
    }

    #[inline]
    pub fn kind(&self) -> FeedKind {
        match self {
            FeedMessage::MarketData(_) => FeedKind::MarketData,
            FeedMessage::OrderReport(_) => FeedKind::OrderReport,
            FeedMessage::Error(_) => FeedKind::Error,
            FeedMessage::Exception(_) => FeedKind::Exception,
        }
    }
}

/// Upstream market data feed
///
/// Implementations push messages onto the queue handed to `connect` from their
/// own producer threads. Subscription calls only notify the broker; bookkeeping
/// lives in `SubscriptionTracker`.
pub trait MarketDataFeed: Send {
    /// Feed name (for logging)
    fn name(&self) -> &'static str;

    /// Open the connection and start producing into `queue`
    fn connect(&mut self, queue: Arc<FeedQueue>) -> Result<()>;

    /// Request quotes for `symbols`
    fn subscribe(&mut self, symbols: &[String]) -> Result<()>;

    /// Stop quotes for `symbols`
    fn unsubscribe(&mut self, symbols: &[String]) -> Result<()>;

    /// Close the connection; further messages are not produced
    fn disconnect(&mut self);
}
