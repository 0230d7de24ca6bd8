//! Test utilities shared across modules
//!
//! Builders for broker payloads and scratch paths for persistence tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Broker-shaped market data payload with the given optional fields
pub fn market_data_json(
    symbol: &str,
    last: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    close: Option<f64>,
) -> String {
    let mut entries = serde_json::Map::new();
    if let Some(price) = last {
        entries.insert("LA".into(), serde_json::json!({ "price": price }));
    }
    if let Some(price) = bid {
        entries.insert("BI".into(), serde_json::json!([{ "price": price, "size": 10 }]));
    }
    if let Some(price) = ask {
        entries.insert("OF".into(), serde_json::json!([{ "price": price, "size": 10 }]));
    }
    if let Some(price) = close {
        entries.insert("CL".into(), serde_json::json!({ "price": price }));
    }

    serde_json::json!({
        "type": "marketData",
        "data": {
            "instrumentId": { "symbol": symbol },
            "marketData": entries,
        }
    })
    .to_string()
}

/// Unique path under the system temp dir (file is not created)
pub fn scratch_path(name: &str) -> PathBuf {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("quote_desk_{}_{}_{}", std::process::id(), n, name))
}
