//! Underlying and MEP summaries
//!
//! Last price with session change for a single instrument, and the MEP rate
//! implied by a peso/dollar pair of the same bond.

use crate::core::MarketStateStore;
use serde::Serialize;

/// Latest value and percent change against the previous close
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceChange {
    pub last: Option<f64>,
    pub change_pct: Option<f64>,
}

#[inline]
fn pct_change(last: Option<f64>, close: Option<f64>) -> Option<f64> {
    let close = close.filter(|c| *c != 0.0)?;
    last.map(|last| (last - close) / close * 100.0)
}

#[inline]
fn ratio(base: Option<f64>, quote: Option<f64>) -> Option<f64> {
    let base = base.filter(|v| *v != 0.0)?;
    let quote = quote.filter(|v| *v != 0.0)?;
    Some(base / quote)
}

pub fn price_change(store: &MarketStateStore, symbol: &str) -> PriceChange {
    let last = store.last(symbol);
    PriceChange {
        last,
        change_pct: pct_change(last, store.close(symbol)),
    }
}

/// MEP rate (`base / quote`) and its change against the ratio of closes
pub fn mep_change(store: &MarketStateStore, base: &str, quote: &str) -> PriceChange {
    let last = ratio(store.last(base), store.last(quote));
    let close = ratio(store.close(base), store.close(quote));
    PriceChange {
        last,
        change_pct: pct_change(last, close),
    }
}
