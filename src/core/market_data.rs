//! Market data types
//!
//! `QuoteRecord` is the per-symbol snapshot held by the store. `QuoteUpdate` is a
//! partial update decoded from the feed: every field is optional and only present
//! fields are merged.

use serde::Serialize;
use time::OffsetDateTime;

/// Top-of-book level (price with optional size)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: Option<f64>,
}

impl BookLevel {
    #[inline]
    pub const fn new(price: f64, size: Option<f64>) -> Self {
        Self { price, size }
    }
}

/// Latest known quote fields for one symbol
///
/// Everything is unknown until first observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuoteRecord {
    /// Last traded price
    pub last: Option<f64>,
    /// Best bid price
    pub bid: Option<f64>,
    /// Best bid size
    pub bid_size: Option<f64>,
    /// Best offer price
    pub ask: Option<f64>,
    /// Best offer size
    pub ask_size: Option<f64>,
    /// Previous session close
    pub close: Option<f64>,
    /// Time the record was last touched by an update
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl QuoteRecord {
    /// Merge the fields present in `update`, leaving the rest untouched
    pub fn merge(&mut self, update: &QuoteUpdate, at: OffsetDateTime) {
        if let Some(last) = update.last {
            self.last = Some(last);
        }
        if let Some(level) = update.bid {
            self.bid = Some(level.price);
            self.bid_size = level.size;
        }
        if let Some(level) = update.ask {
            self.ask = Some(level.price);
            self.ask_size = level.size;
        }
        if let Some(close) = update.close {
            self.close = Some(close);
        }
        self.updated_at = Some(at);
    }

    /// True if nothing has been observed yet
    pub fn is_empty(&self) -> bool {
        self.updated_at.is_none()
    }
}

/// Partial quote update for a single symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteUpdate {
    pub symbol: String,
    pub last: Option<f64>,
    pub bid: Option<BookLevel>,
    pub ask: Option<BookLevel>,
    pub close: Option<f64>,
}

impl QuoteUpdate {
    /// Update carrying only a symbol; fields are set with the builder methods
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_last(mut self, price: f64) -> Self {
        self.last = Some(price);
        self
    }

    pub fn with_bid(mut self, price: f64, size: Option<f64>) -> Self {
        self.bid = Some(BookLevel::new(price, size));
        self
    }

    pub fn with_ask(mut self, price: f64, size: Option<f64>) -> Self {
        self.ask = Some(BookLevel::new(price, size));
        self
    }

    pub fn with_close(mut self, price: f64) -> Self {
        self.close = Some(price);
        self
    }
}
