//! Core types for market-state tracking
//!
//! This module contains the fundamental types used throughout the desk:
//! - QuoteRecord / QuoteUpdate: per-symbol quote fields
//! - MarketStateStore: latest state per symbol
//! - Symbol conventions: option side, strike, display cleaning
//! - NoteTable: discount note maturities and redemption values

pub mod market_data;
pub mod notes;
pub mod store;
pub mod symbol;

pub use market_data::{BookLevel, QuoteRecord, QuoteUpdate};
pub use notes::{DiscountNote, NoteTable};
pub use store::MarketStateStore;
pub use symbol::{OptionSide, Strike};
