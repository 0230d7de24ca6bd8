//! Option chain aggregation
//!
//! Pairs call and put symbols by strike, copies their book from the store and
//! solves bid and ask implied volatilities against the underlying spot.

use super::black_scholes::{implied_volatility, OptionInputs};
use crate::core::symbol::{is_call_code, is_put_code, parse_strike};
use crate::core::{MarketStateStore, OptionSide, Strike};
use crate::infrastructure::config::ChainConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fallback colour scale bounds (percent) when no IV is known
pub const DEFAULT_IV_RANGE: (f64, f64) = (10.0, 150.0);

const LOW_COLOR: (f64, f64, f64) = (46.0, 204.0, 113.0);
const HIGH_COLOR: (f64, f64, f64) = (231.0, 76.0, 60.0);

/// User-controlled pricing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    pub days_to_expiry: u32,
    /// Annual, percent
    pub risk_free_rate_pct: f64,
    /// Annual, percent
    pub dividend_yield_pct: f64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            days_to_expiry: 30,
            risk_free_rate_pct: 60.0,
            dividend_yield_pct: 0.0,
        }
    }
}

impl From<&ChainConfig> for ChainParams {
    fn from(config: &ChainConfig) -> Self {
        Self {
            days_to_expiry: config.days_to_expiry,
            risk_free_rate_pct: config.risk_free_rate_pct,
            dividend_yield_pct: config.dividend_yield_pct,
        }
    }
}

impl ChainParams {
    /// Years to expiry; at least one day
    #[inline]
    pub fn time_to_expiry(&self) -> f64 {
        f64::from(self.days_to_expiry.max(1)) / 365.0
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.risk_free_rate_pct / 100.0
    }

    #[inline]
    pub fn dividend_yield(&self) -> f64 {
        self.dividend_yield_pct / 100.0
    }
}

/// One side (call or put) of a chain row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideQuote {
    pub symbol: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    /// Percent
    pub bid_iv: Option<f64>,
    /// Percent
    pub ask_iv: Option<f64>,
}

impl SideQuote {
    fn unquoted(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bid: None,
            ask: None,
            bid_iv: None,
            ask_iv: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainRow {
    pub strike: Strike,
    pub call: Option<SideQuote>,
    pub put: Option<SideQuote>,
}

/// Linear colour scale over the chain's IVs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IvScale {
    pub min: f64,
    pub max: f64,
}

impl Default for IvScale {
    fn default() -> Self {
        Self {
            min: DEFAULT_IV_RANGE.0,
            max: DEFAULT_IV_RANGE.1,
        }
    }
}

impl IvScale {
    /// Scale spanning `values`
    ///
    /// Falls back to [`DEFAULT_IV_RANGE`] when empty and widens a single
    /// value `v` to `[max(0, v - 1), v + 1]`.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let (min, max) = values
            .into_iter()
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or(DEFAULT_IV_RANGE);

        if (max - min).abs() < 1e-9 {
            Self {
                min: (min - 1.0).max(0.0),
                max: min + 1.0,
            }
        } else {
            Self { min, max }
        }
    }

    /// Position of `value` in the scale, clamped to `[0, 1]`
    pub fn intensity(&self, value: f64) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }

    /// `#rrggbb` between green (low) and red (high)
    pub fn color(&self, value: f64) -> String {
        let t = self.intensity(value);
        let channel = |lo: f64, hi: f64| (lo + t * (hi - lo)) as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(LOW_COLOR.0, HIGH_COLOR.0),
            channel(LOW_COLOR.1, HIGH_COLOR.1),
            channel(LOW_COLOR.2, HIGH_COLOR.2),
        )
    }
}

/// Rows by ascending strike plus the scale used to colour their IVs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionChain {
    pub rows: Vec<ChainRow>,
    pub iv_scale: IvScale,
}

impl OptionChain {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every known IV in the chain
    pub fn iv_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows
            .iter()
            .flat_map(|row| [row.call.as_ref(), row.put.as_ref()])
            .flatten()
            .flat_map(|side| [side.bid_iv, side.ask_iv])
            .flatten()
    }
}

/// Build the chain for the selected `calls` and `puts`
///
/// Symbols whose strike cannot be parsed are skipped. Each symbol lands in
/// the call or put slot of its strike by contract code; a later symbol in
/// sorted order replaces an earlier one in the same slot.
pub fn build_chain<S: AsRef<str>>(
    calls: &[S],
    puts: &[S],
    spot: Option<f64>,
    params: &ChainParams,
    store: &MarketStateStore,
) -> OptionChain {
    let symbols: BTreeSet<&str> = calls.iter().chain(puts).map(<S as AsRef<str>>::as_ref).collect();

    let mut slots: BTreeMap<Strike, (Option<&str>, Option<&str>)> = BTreeMap::new();
    for symbol in symbols {
        let Some(strike) = parse_strike(symbol) else {
            continue;
        };
        let slot = slots.entry(strike).or_default();
        if is_call_code(symbol) {
            slot.0 = Some(symbol);
        } else if is_put_code(symbol) {
            slot.1 = Some(symbol);
        }
    }

    let spot = spot.filter(|s| *s > 0.0);
    let rows: Vec<ChainRow> = slots
        .into_iter()
        .map(|(strike, (call, put))| ChainRow {
            strike,
            call: call.map(|s| quote_side(s, OptionSide::Call, strike, spot, params, store)),
            put: put.map(|s| quote_side(s, OptionSide::Put, strike, spot, params, store)),
        })
        .collect();

    let mut chain = OptionChain {
        rows,
        iv_scale: IvScale::default(),
    };
    chain.iv_scale = IvScale::from_values(chain.iv_values());
    chain
}

fn quote_side(
    symbol: &str,
    side: OptionSide,
    strike: Strike,
    spot: Option<f64>,
    params: &ChainParams,
    store: &MarketStateStore,
) -> SideQuote {
    let mut quote = SideQuote::unquoted(symbol);
    if !store.contains(symbol) {
        return quote;
    }

    let record = store.get(symbol);
    quote.bid = record.bid;
    quote.ask = record.ask;

    if let Some(spot) = spot {
        let inputs = OptionInputs {
            spot,
            strike: strike.as_f64(),
            time: params.time_to_expiry(),
            rate: params.rate(),
            dividend_yield: params.dividend_yield(),
            side,
        };
        quote.bid_iv = solve_pct(quote.bid, &inputs);
        quote.ask_iv = solve_pct(quote.ask, &inputs);
    }

    quote
}

/// Implied volatility in percent for a known, non-zero price
fn solve_pct(observed: Option<f64>, inputs: &OptionInputs) -> Option<f64> {
    let observed = observed.filter(|p| *p != 0.0)?;
    match implied_volatility(observed, inputs) {
        Ok(vol) => Some(vol * 100.0),
        Err(e) => {
            tracing::trace!("No IV at strike {}: {}", inputs.strike, e);
            None
        }
    }
}
