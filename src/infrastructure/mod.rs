//! Infrastructure - everything outside the recomputation path
//!
//! - Configuration and logging
//! - Metrics
//! - Persistence of tickers and panel selection
//! - Cached reference quote over HTTP
//! - HTTP API

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod reference_cache;

pub use api::{start_server, AppState};
pub use reference_cache::{HttpReferenceSource, ReferenceQuoteCache, ReferenceSource};
