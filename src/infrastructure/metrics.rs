//! Metrics collection for desk monitoring
//!
//! Lock-free counters using atomic operations.
//! Updated by the ingestion loop and cycle task, exported via the API.

use crate::feed::FeedKind;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Desk metrics collector
///
/// Thread-safe counters updated from the cycle task.
/// Snapshots taken for API export.
pub struct MetricsCollector {
    /// Total messages drained from the feed queue
    total_messages: AtomicU64,
    market_data_messages: AtomicU64,
    order_reports: AtomicU64,
    error_notices: AtomicU64,
    exceptions: AtomicU64,
    /// Quote updates merged into the store
    quotes_applied: AtomicU64,
    /// Completed recomputation cycles
    cycles: AtomicU64,
    /// Last message timestamp (Unix millis)
    last_message_time: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_messages: u64,
    pub market_data_messages: u64,
    pub order_reports: u64,
    pub error_notices: u64,
    pub exceptions: u64,
    pub quotes_applied: u64,
    pub cycles: u64,
    pub message_rate: f64, // messages per second
    pub uptime_seconds: u64,
    /// Milliseconds since the last drained message, capped at 10s
    pub staleness_ms: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_messages: AtomicU64::new(0),
            market_data_messages: AtomicU64::new(0),
            order_reports: AtomicU64::new(0),
            error_notices: AtomicU64::new(0),
            exceptions: AtomicU64::new(0),
            quotes_applied: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            last_message_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one drained message of the given kind
    #[inline]
    pub fn record_message(&self, kind: FeedKind) {
        let counter = match kind {
            FeedKind::MarketData => &self.market_data_messages,
            FeedKind::OrderReport => &self.order_reports,
            FeedKind::Error => &self.error_notices,
            FeedKind::Exception => &self.exceptions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        self.last_message_time.store(unix_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_quote_applied(&self) {
        self.quotes_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_messages.load(Ordering::Relaxed);

        let uptime = self.start_time.elapsed().as_secs();
        let rate = if uptime > 0 {
            total as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            total_messages: total,
            market_data_messages: self.market_data_messages.load(Ordering::Relaxed),
            order_reports: self.order_reports.load(Ordering::Relaxed),
            error_notices: self.error_notices.load(Ordering::Relaxed),
            exceptions: self.exceptions.load(Ordering::Relaxed),
            quotes_applied: self.quotes_applied.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            message_rate: rate,
            uptime_seconds: uptime,
            staleness_ms: self.staleness_ms(),
        }
    }

    /// Time since the last drained message, capped at 10000ms
    pub fn staleness_ms(&self) -> u64 {
        let last = self.last_message_time.load(Ordering::Relaxed);
        if last == 0 {
            return 10000; // No messages yet
        }
        unix_millis().saturating_sub(last).min(10000)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        let snapshot = collector.snapshot();

        assert_eq!(snapshot.total_messages, 0);
        assert_eq!(snapshot.quotes_applied, 0);
        assert_eq!(snapshot.cycles, 0);
        assert_eq!(snapshot.staleness_ms, 10000);
    }

    #[test]
    fn test_record_messages_by_kind() {
        let collector = MetricsCollector::new();

        collector.record_message(FeedKind::MarketData);
        collector.record_message(FeedKind::MarketData);
        collector.record_message(FeedKind::OrderReport);
        collector.record_message(FeedKind::Exception);
        collector.record_quote_applied();
        collector.record_cycle();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_messages, 4);
        assert_eq!(snapshot.market_data_messages, 2);
        assert_eq!(snapshot.order_reports, 1);
        assert_eq!(snapshot.error_notices, 0);
        assert_eq!(snapshot.exceptions, 1);
        assert_eq!(snapshot.quotes_applied, 1);
        assert_eq!(snapshot.cycles, 1);
        assert!(snapshot.staleness_ms < 10000);
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        let json = serde_json::to_value(collector.snapshot()).unwrap();
        assert_eq!(json["total_messages"], 0);
        assert!(json.get("message_rate").is_some());
    }
}
