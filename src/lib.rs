//! Quote ingestion and analytics desk
//!
//! Core library for market-state tracking and the derived analytics built on it:
//! option-chain implied volatility and discount-note yields.

pub mod analytics;
pub mod core;
pub mod engine;
pub mod feed;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use engine::{DeskEngine, DeskSnapshot};
pub use infrastructure::config::Config;

use thiserror::Error;

/// Main error type for the desk
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] infrastructure::persistence::PersistenceError),

    #[error("Reference quote error: {0}")]
    Reference(#[from] infrastructure::reference_cache::ReferenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DeskError>;
