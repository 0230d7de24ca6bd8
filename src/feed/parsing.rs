//! Broker payload decoding
//!
//! Market data payloads look like:
//! `{"instrumentId":{"symbol":"…"},"marketData":{"LA":{"price":…},"BI":[{"price":…,"size":…}],"OF":[…],"CL":{"price":…}}}`
//! Null or empty entries mean "not present in this update".

use crate::core::{BookLevel, QuoteUpdate};
use serde::Deserialize;

/// Instrument identifier block
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InstrumentId {
    pub symbol: Option<String>,
}

/// Single price entry (`LA`, `CL`, or one book level)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PriceEntry {
    pub price: Option<f64>,
    pub size: Option<f64>,
}

/// Entries block of a market data payload
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketDataEntries {
    #[serde(rename = "LA")]
    pub last: Option<PriceEntry>,
    #[serde(rename = "BI")]
    pub bids: Option<Vec<PriceEntry>>,
    #[serde(rename = "OF")]
    pub offers: Option<Vec<PriceEntry>>,
    #[serde(rename = "CL")]
    pub close: Option<PriceEntry>,
}

/// Market data payload as pushed by the broker feed
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataPayload {
    pub instrument_id: Option<InstrumentId>,
    pub market_data: Option<MarketDataEntries>,
}

impl MarketDataPayload {
    /// Convert into a partial quote update
    ///
    /// Returns `None` when the payload carries no symbol.
    pub fn into_update(self) -> Option<QuoteUpdate> {
        let symbol = self.instrument_id?.symbol.filter(|s| !s.is_empty())?;
        let mut update = QuoteUpdate::new(symbol);

        let Some(entries) = self.market_data else {
            return Some(update);
        };

        update.last = entries.last.and_then(|e| e.price);
        update.bid = top_of_book(entries.bids.as_deref());
        update.ask = top_of_book(entries.offers.as_deref());
        update.close = entries.close.and_then(|e| e.price);

        Some(update)
    }
}

/// First level of a book side, if it has a price
#[inline]
fn top_of_book(levels: Option<&[PriceEntry]>) -> Option<BookLevel> {
    let first = levels?.first()?;
    first.price.map(|price| BookLevel::new(price, first.size))
}
