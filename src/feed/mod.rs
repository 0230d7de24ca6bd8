//! Market data feed
//!
//! Producer side (feed implementations, queue), consumer side (ingestion) and
//! subscription bookkeeping.

pub mod ingest;
pub mod parsing;
pub mod queue;
pub mod replay;
pub mod subscription;
pub mod traits;

pub use ingest::{Ingestor, DEFAULT_DRAIN_LIMIT};
pub use parsing::MarketDataPayload;
pub use queue::FeedQueue;
pub use replay::ReplayFeed;
pub use subscription::SubscriptionTracker;
pub use traits::{FeedKind, FeedMessage, MarketDataFeed};
