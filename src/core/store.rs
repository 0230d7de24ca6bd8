//! Market State Store
//!
//! Holds the latest known quote fields per symbol. Records are created on first
//! update and never removed: data for symbols that are no longer subscribed stays
//! available until restart.

use super::market_data::{QuoteRecord, QuoteUpdate};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Record returned for symbols never observed
static EMPTY_RECORD: QuoteRecord = QuoteRecord {
    last: None,
    bid: None,
    bid_size: None,
    ask: None,
    ask_size: None,
    close: None,
    updated_at: None,
};

/// Per-symbol market state, last-write-wins per field
#[derive(Debug, Default)]
pub struct MarketStateStore {
    records: HashMap<String, QuoteRecord>,
}

impl MarketStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an update stamped with the current time
    pub fn apply(&mut self, update: &QuoteUpdate) {
        self.apply_at(update, OffsetDateTime::now_utc());
    }

    /// Merge an update stamped with `at`
    pub fn apply_at(&mut self, update: &QuoteUpdate, at: OffsetDateTime) {
        self.records
            .entry(update.symbol.clone())
            .or_default()
            .merge(update, at);
    }

    /// Current record, or an all-unknown record if never observed
    #[inline]
    pub fn get(&self, symbol: &str) -> &QuoteRecord {
        self.records.get(symbol).unwrap_or(&EMPTY_RECORD)
    }

    /// True if at least one update was applied for `symbol`
    #[inline]
    pub fn contains(&self, symbol: &str) -> bool {
        self.records.contains_key(symbol)
    }

    #[inline]
    pub fn last(&self, symbol: &str) -> Option<f64> {
        self.get(symbol).last
    }

    #[inline]
    pub fn close(&self, symbol: &str) -> Option<f64> {
        self.get(symbol).close
    }

    /// All symbols with a record (unordered)
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
