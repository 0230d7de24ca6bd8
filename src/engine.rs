//! Desk Engine
//!
//! Owns all desk state: market store, subscriptions, feed handle, reference
//! data and user settings. A single task drives it: every cycle drains the
//! feed queue and recomputes the derived tables into a `DeskSnapshot`;
//! commands from the API are applied between cycles.

use crate::analytics::fixed_income::{build_note_rows, BandSchedule, Bands, NoteRow};
use crate::analytics::option_chain::{build_chain, ChainParams, OptionChain};
use crate::analytics::reference::{mep_change, price_change, PriceChange};
use crate::core::symbol::{is_call_code, is_put_code, is_underlying_option};
use crate::core::{MarketStateStore, NoteTable};
use crate::feed::{FeedQueue, Ingestor, MarketDataFeed, SubscriptionTracker};
use crate::infrastructure::config::Config;
use crate::infrastructure::metrics::{MetricsCollector, MetricsSnapshot};
use crate::infrastructure::persistence::{PanelSettings, TickerFile};
use crate::infrastructure::reference_cache::{ReferenceQuote, ReferenceQuoteCache, ReferenceSource};
use crate::{DeskError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use time::{Date, OffsetDateTime};

/// Requests applied by the cycle task between recomputations
#[derive(Debug, Clone, PartialEq)]
pub enum DeskCommand {
    Subscribe(Vec<String>),
    UnsubscribeAll,
    SetSelection { calls: Vec<String>, puts: Vec<String> },
    SetChainParams(ChainParams),
}

/// Listed options on the underlying, split by side
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionUniverse {
    pub calls: Vec<String>,
    pub puts: Vec<String>,
}

/// Everything the presentation boundary reads, recomputed every cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeskSnapshot {
    #[serde(with = "time::serde::rfc3339::option")]
    pub generated_at: Option<OffsetDateTime>,
    pub connected: bool,
    pub underlying: PriceChange,
    pub mep: PriceChange,
    pub reference: ReferenceQuote,
    /// Today's FX band
    pub bands: Option<Bands>,
    pub chain: OptionChain,
    pub chain_params: ChainParams,
    pub notes: Vec<NoteRow>,
    pub universe: OptionUniverse,
    /// Saved selection restricted to the current universe
    pub selection: PanelSettings,
    pub subscriptions: Vec<String>,
    pub metrics: MetricsSnapshot,
}

/// Main desk context
pub struct DeskEngine<R> {
    config: Config,
    store: MarketStateStore,
    tracker: SubscriptionTracker,
    ingestor: Ingestor,
    feed: Option<Box<dyn MarketDataFeed>>,
    connected: bool,
    notes: NoteTable,
    bands: BandSchedule,
    tickers: TickerFile,
    panel: PanelSettings,
    params: ChainParams,
    universe: OptionUniverse,
    selection: PanelSettings,
    reference: ReferenceQuoteCache<R>,
    metrics: Arc<MetricsCollector>,
}

impl<R: ReferenceSource> DeskEngine<R> {
    /// Build the engine from configuration
    ///
    /// # Errors
    /// Returns `DeskError::Config` for an invalid note table or band epoch.
    pub fn new(
        config: Config,
        feed: Option<Box<dyn MarketDataFeed>>,
        reference_source: R,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let notes = NoteTable::from_entries(&config.notes)?;
        let bands = BandSchedule::from_config(&config.bands)?;
        let tickers = TickerFile::new(&config.persistence.tickers_path);
        let panel = PanelSettings::load_or_default(&config.persistence.panel_path);
        let params = ChainParams::from(&config.chain);
        let reference = ReferenceQuoteCache::new(
            reference_source,
            Duration::from_secs(config.reference.cache_secs),
        );

        tracing::info!(
            "Desk engine ready: {} notes, {} saved calls, {} saved puts",
            notes.len(),
            panel.calls.len(),
            panel.puts.len()
        );

        Ok(Self {
            ingestor: Ingestor::new(Arc::clone(&metrics)),
            config,
            store: MarketStateStore::new(),
            tracker: SubscriptionTracker::new(),
            feed,
            connected: false,
            notes,
            bands,
            tickers,
            panel,
            params,
            universe: OptionUniverse::default(),
            selection: PanelSettings::default(),
            reference,
            metrics,
        })
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn store(&self) -> &MarketStateStore {
        &self.store
    }

    pub fn subscriptions(&self) -> &[String] {
        self.tracker.symbols()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Open the feed and re-subscribe the saved ticker list
    ///
    /// Calling it while connected only repeats the re-subscription. A failed
    /// re-subscription is logged; the saved tickers stay untracked so a later
    /// `subscribe` can send them again.
    /// # Errors
    /// Fails when no feed is configured or the feed cannot connect.
    pub fn connect(&mut self) -> Result<()> {
        if !self.connected {
            let feed = self
                .feed
                .as_mut()
                .ok_or_else(|| DeskError::Feed("no feed configured".into()))?;

            let queue = Arc::new(FeedQueue::new());
            feed.connect(Arc::clone(&queue))?;
            tracing::info!(target: "feed", "Connected to {} feed", feed.name());

            self.ingestor.attach(queue);
            self.connected = true;
        }

        let saved = self.saved_tickers();
        if !saved.is_empty() {
            if let Err(e) = self.subscribe(&saved) {
                tracing::warn!(target: "feed", "Re-subscribing saved tickers failed: {}", e);
            }
        }
        Ok(())
    }

    /// Close the feed; tracked symbols are kept
    pub fn disconnect(&mut self) {
        if let Some(feed) = self.feed.as_mut() {
            feed.disconnect();
        }
        self.ingestor.detach();
        self.connected = false;
        tracing::info!(target: "feed", "Feed disconnected");
    }

    /// Subscribe to symbols not yet tracked
    ///
    /// No-op while disconnected. Only new symbols are sent upstream; they are
    /// tracked once the feed accepts them, after which the full list is
    /// persisted. Returns the symbols added.
    pub fn subscribe<S: AsRef<str>>(&mut self, symbols: &[S]) -> Result<Vec<String>> {
        if !self.connected {
            tracing::debug!("Subscribe ignored while disconnected");
            return Ok(Vec::new());
        }

        let pending = self.tracker.pending(symbols);
        if pending.is_empty() {
            return Ok(pending);
        }

        if let Some(feed) = self.feed.as_mut() {
            feed.subscribe(&pending)?;
        }
        let added = self.tracker.add(&pending);
        self.tickers.save(self.tracker.symbols())?;
        tracing::info!(target: "feed", "Subscribed {} symbols ({} total)", added.len(), self.tracker.len());

        Ok(added)
    }

    /// Drop every subscription and persist the empty list
    pub fn unsubscribe_all(&mut self) -> Result<()> {
        let previous = self.tracker.remove_all();

        if self.connected && !previous.is_empty() {
            if let Some(feed) = self.feed.as_mut() {
                if let Err(e) = feed.unsubscribe(&previous) {
                    tracing::warn!(target: "feed", "Unsubscribe failed: {}", e);
                }
            }
        }
        self.tickers.save(&[])?;
        tracing::info!(target: "feed", "Unsubscribed {} symbols", previous.len());
        Ok(())
    }

    /// Replace and persist the saved call/put selection
    pub fn set_selection(&mut self, calls: Vec<String>, puts: Vec<String>) -> Result<()> {
        self.panel = PanelSettings { calls, puts };
        self.panel.save(&self.config.persistence.panel_path)?;
        self.selection = effective_selection(&self.panel, &self.universe);
        Ok(())
    }

    pub fn set_chain_params(&mut self, params: ChainParams) {
        self.params = params;
    }

    pub fn chain_params(&self) -> ChainParams {
        self.params
    }

    /// Apply one API command, logging failures
    pub fn handle_command(&mut self, command: DeskCommand) {
        let result = match command {
            DeskCommand::Subscribe(symbols) => self.subscribe(&symbols).map(|_| ()),
            DeskCommand::UnsubscribeAll => self.unsubscribe_all(),
            DeskCommand::SetSelection { calls, puts } => self.set_selection(calls, puts),
            DeskCommand::SetChainParams(params) => {
                self.set_chain_params(params);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::error!("Command failed: {}", e);
        }
    }

    /// Recompute the listed option universe and the effective selection
    ///
    /// The universe covers everything seen in the store, tracked or saved.
    pub fn refresh_option_universe(&mut self) -> &OptionUniverse {
        let saved = self.saved_tickers();
        let options: BTreeSet<&str> = self
            .store
            .symbols()
            .chain(self.tracker.symbols().iter().map(String::as_str))
            .chain(saved.iter().map(String::as_str))
            .filter(|s| is_underlying_option(s))
            .collect();

        self.universe = OptionUniverse {
            calls: options.iter().filter(|s| is_call_code(s)).map(|s| s.to_string()).collect(),
            puts: options.iter().filter(|s| is_put_code(s)).map(|s| s.to_string()).collect(),
        };
        self.selection = effective_selection(&self.panel, &self.universe);
        &self.universe
    }

    /// One full cycle: drain, recompute, publish
    pub async fn run_cycle(&mut self, today: Date) -> DeskSnapshot {
        let pulled = self.ingestor.drain(&mut self.store, self.config.desk.drain_limit);
        if pulled > 0 {
            tracing::trace!(target: "ingest", "Drained {} messages", pulled);
        }

        self.refresh_option_universe();
        self.ensure_subscribed(&[
            self.config.instruments.mep_base.clone(),
            self.config.instruments.mep_quote.clone(),
        ]);
        self.ensure_subscribed(&[self.config.instruments.underlying.clone()]);

        let instruments = &self.config.instruments;
        let mep = mep_change(&self.store, &instruments.mep_base, &instruments.mep_quote);
        let underlying = price_change(&self.store, &instruments.underlying);

        let notes = build_note_rows(
            self.tracker.symbols(),
            &self.store,
            &self.notes,
            mep.last,
            &self.bands,
            today,
        );
        let chain = build_chain(
            &self.selection.calls,
            &self.selection.puts,
            underlying.last,
            &self.params,
            &self.store,
        );

        let reference = self.reference.current().await;
        self.metrics.record_cycle();

        DeskSnapshot {
            generated_at: Some(OffsetDateTime::now_utc()),
            connected: self.connected,
            underlying,
            mep,
            reference,
            bands: Some(self.bands.bands(today)),
            chain,
            chain_params: self.params,
            notes,
            universe: self.universe.clone(),
            selection: self.selection.clone(),
            subscriptions: self.tracker.symbols().to_vec(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn ensure_subscribed(&mut self, symbols: &[String]) {
        let missing: Vec<&String> = symbols.iter().filter(|s| !self.tracker.contains(s)).collect();
        if missing.is_empty() || !self.connected {
            return;
        }
        if let Err(e) = self.subscribe(&missing) {
            tracing::warn!(target: "feed", "Auto-subscribe failed: {}", e);
        }
    }

    fn saved_tickers(&self) -> Vec<String> {
        self.tickers.load().unwrap_or_else(|e| {
            tracing::warn!("Cannot read saved tickers: {}", e);
            Vec::new()
        })
    }
}

fn effective_selection(panel: &PanelSettings, universe: &OptionUniverse) -> PanelSettings {
    let keep = |saved: &[String], available: &[String]| -> Vec<String> {
        saved.iter().filter(|s| available.contains(s)).cloned().collect()
    };
    PanelSettings {
        calls: keep(&panel.calls, &universe.calls),
        puts: keep(&panel.puts, &universe.puts),
    }
}

impl<R> Drop for DeskEngine<R> {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.as_mut() {
            feed.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::reference_cache::ReferenceError;
    use crate::test_utils::{market_data_json, scratch_path};
    use parking_lot::Mutex;
    use time::macros::date;

    const CALL: &str = "MERV - XMEV - GFGC1000X - 24hs";
    const PUT: &str = "MERV - XMEV - GFGV1000X - 24hs";
    const NOTE: &str = "MERV - XMEV - S31O5 - 24hs";
    const UNDERLYING: &str = "MERV - XMEV - GGAL - 24hs";
    const MEP_BASE: &str = "MERV - XMEV - AL30 - 24hs";
    const MEP_QUOTE: &str = "MERV - XMEV - AL30D - 24hs";

    /// Shared view of what the fake feed was asked to do
    #[derive(Default)]
    struct FeedLog {
        queue: Option<Arc<FeedQueue>>,
        subscribed: Vec<String>,
        unsubscribed: Vec<String>,
        /// Upcoming subscribe calls to reject
        failing_subscribes: usize,
        failing_unsubscribe: bool,
    }

    struct FakeFeed {
        log: Arc<Mutex<FeedLog>>,
        fail_connect: bool,
    }

    impl MarketDataFeed for FakeFeed {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn connect(&mut self, queue: Arc<FeedQueue>) -> Result<()> {
            if self.fail_connect {
                return Err(DeskError::Feed("refused".into()));
            }
            self.log.lock().queue = Some(queue);
            Ok(())
        }

        fn subscribe(&mut self, symbols: &[String]) -> Result<()> {
            let mut log = self.log.lock();
            if log.failing_subscribes > 0 {
                log.failing_subscribes -= 1;
                return Err(DeskError::Feed("subscription rejected".into()));
            }
            log.subscribed.extend_from_slice(symbols);
            Ok(())
        }

        fn unsubscribe(&mut self, symbols: &[String]) -> Result<()> {
            let mut log = self.log.lock();
            if log.failing_unsubscribe {
                return Err(DeskError::Feed("unsubscribe rejected".into()));
            }
            log.unsubscribed.extend_from_slice(symbols);
            Ok(())
        }

        fn disconnect(&mut self) {}
    }

    struct FixedReference;

    impl ReferenceSource for FixedReference {
        async fn fetch(&self) -> std::result::Result<ReferenceQuote, ReferenceError> {
            Ok(ReferenceQuote {
                price: Some(1250.0),
                variation: Some(0.4),
            })
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.persistence.tickers_path = scratch_path("engine_tickers.txt");
        config.persistence.panel_path = scratch_path("engine_panel.json");
        config
    }

    fn engine_with(config: Config, fail_connect: bool) -> (DeskEngine<FixedReference>, Arc<Mutex<FeedLog>>) {
        let log = Arc::new(Mutex::new(FeedLog::default()));
        let feed = FakeFeed {
            log: Arc::clone(&log),
            fail_connect,
        };
        let engine = DeskEngine::new(
            config,
            Some(Box::new(feed)),
            FixedReference,
            Arc::new(MetricsCollector::new()),
        )
        .unwrap();
        (engine, log)
    }

    fn push(log: &Arc<Mutex<FeedLog>>, json: String) {
        let queue = log.lock().queue.clone().unwrap();
        assert!(queue.push_json(&json));
    }

    #[test]
    fn test_subscribe_requires_connection() {
        let (mut engine, log) = engine_with(test_config(), false);

        assert!(engine.subscribe(&["A"]).unwrap().is_empty());
        assert!(engine.subscriptions().is_empty());
        assert!(log.lock().subscribed.is_empty());
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let (mut engine, _) = engine_with(test_config(), true);
        assert!(matches!(engine.connect(), Err(DeskError::Feed(_))));
        assert!(!engine.is_connected());
    }

    #[test]
    fn test_failed_subscribe_can_be_retried() {
        let config = test_config();
        let (mut engine, log) = engine_with(config.clone(), false);
        engine.connect().unwrap();
        log.lock().failing_subscribes = 1;

        assert!(matches!(engine.subscribe(&["A"]), Err(DeskError::Feed(_))));
        assert!(engine.subscriptions().is_empty());
        assert!(log.lock().subscribed.is_empty());

        assert_eq!(engine.subscribe(&["A"]).unwrap(), vec!["A"]);
        assert_eq!(engine.subscriptions(), &["A"]);
        assert_eq!(log.lock().subscribed, vec!["A"]);

        std::fs::remove_file(&config.persistence.tickers_path).ok();
    }

    #[test]
    fn test_connect_survives_failed_resubscribe() {
        let config = test_config();
        TickerFile::new(&config.persistence.tickers_path)
            .save(&["A".to_string()])
            .unwrap();

        let (mut engine, log) = engine_with(config.clone(), false);
        log.lock().failing_subscribes = 1;

        engine.connect().unwrap();
        assert!(engine.is_connected());
        assert!(engine.ingestor.is_attached());
        assert!(engine.subscriptions().is_empty());

        // the saved list is untouched, so connecting again sends it
        engine.connect().unwrap();
        assert_eq!(engine.subscriptions(), &["A"]);
        assert_eq!(log.lock().subscribed, vec!["A"]);

        std::fs::remove_file(&config.persistence.tickers_path).ok();
    }

    #[test]
    fn test_unsubscribe_all_clears_despite_feed_error() {
        let config = test_config();
        let (mut engine, log) = engine_with(config.clone(), false);
        engine.connect().unwrap();
        engine.subscribe(&["A", "B"]).unwrap();
        log.lock().failing_unsubscribe = true;

        engine.unsubscribe_all().unwrap();
        assert!(engine.subscriptions().is_empty());
        assert!(TickerFile::new(&config.persistence.tickers_path).load().unwrap().is_empty());

        std::fs::remove_file(&config.persistence.tickers_path).ok();
    }

    #[test]
    fn test_connect_without_feed() {
        let mut engine = DeskEngine::new(
            test_config(),
            None,
            FixedReference,
            Arc::new(MetricsCollector::new()),
        )
        .unwrap();
        assert!(engine.connect().is_err());
    }

    #[test]
    fn test_connect_resubscribes_saved_tickers() {
        let config = test_config();
        TickerFile::new(&config.persistence.tickers_path)
            .save(&["B".to_string(), "A".to_string()])
            .unwrap();

        let (mut engine, log) = engine_with(config.clone(), false);
        engine.connect().unwrap();

        assert_eq!(engine.subscriptions(), &["B", "A"]);
        assert_eq!(log.lock().subscribed, vec!["B", "A"]);

        // connecting again does not duplicate anything upstream
        engine.connect().unwrap();
        assert_eq!(log.lock().subscribed.len(), 2);

        std::fs::remove_file(&config.persistence.tickers_path).ok();
    }

    #[test]
    fn test_subscribe_persists_and_dedups() {
        let config = test_config();
        let (mut engine, log) = engine_with(config.clone(), false);
        engine.connect().unwrap();

        assert_eq!(engine.subscribe(&["A", "B"]).unwrap(), vec!["A", "B"]);
        assert!(engine.subscribe(&["A"]).unwrap().is_empty());
        assert_eq!(log.lock().subscribed, vec!["A", "B"]);

        let saved = TickerFile::new(&config.persistence.tickers_path).load().unwrap();
        assert_eq!(saved, vec!["A", "B"]);

        engine.unsubscribe_all().unwrap();
        assert!(engine.subscriptions().is_empty());
        assert_eq!(log.lock().unsubscribed, vec!["A", "B"]);
        assert!(TickerFile::new(&config.persistence.tickers_path).load().unwrap().is_empty());

        std::fs::remove_file(&config.persistence.tickers_path).ok();
    }

    #[test]
    fn test_handle_command_updates_params() {
        let (mut engine, _) = engine_with(test_config(), false);
        let params = ChainParams {
            days_to_expiry: 10,
            risk_free_rate_pct: 40.0,
            dividend_yield_pct: 1.0,
        };

        engine.handle_command(DeskCommand::SetChainParams(params));
        assert_eq!(engine.chain_params(), params);
    }

    #[test]
    fn test_option_universe_and_selection() {
        let config = test_config();
        let (mut engine, log) = engine_with(config.clone(), false);
        engine.connect().unwrap();
        engine.subscribe(&[CALL, NOTE]).unwrap();
        push(&log, market_data_json(PUT, None, Some(1.0), Some(2.0), None));
        engine.ingestor.drain(&mut engine.store, 100);

        engine
            .set_selection(vec![CALL.into(), "gone".into()], vec![PUT.into()])
            .unwrap();
        let universe = engine.refresh_option_universe().clone();

        assert_eq!(universe.calls, vec![CALL]);
        assert_eq!(universe.puts, vec![PUT]);
        assert_eq!(engine.selection.calls, vec![CALL]);
        assert_eq!(engine.selection.puts, vec![PUT]);

        let saved = PanelSettings::load(&config.persistence.panel_path).unwrap();
        assert_eq!(saved.calls, vec![CALL, "gone"]);

        std::fs::remove_file(&config.persistence.tickers_path).ok();
        std::fs::remove_file(&config.persistence.panel_path).ok();
    }

    #[tokio::test]
    async fn test_cycle_populates_snapshot() {
        let config = test_config();
        let (mut engine, log) = engine_with(config.clone(), false);
        engine.connect().unwrap();
        engine.subscribe(&[NOTE, CALL, PUT]).unwrap();
        engine
            .set_selection(vec![CALL.into()], vec![PUT.into()])
            .unwrap();
        engine.set_chain_params(ChainParams {
            days_to_expiry: 30,
            risk_free_rate_pct: 5.0,
            dividend_yield_pct: 0.0,
        });

        push(&log, market_data_json(UNDERLYING, Some(100.0), None, None, Some(98.0)));
        push(&log, market_data_json(MEP_BASE, Some(78_000.0), None, None, None));
        push(&log, market_data_json(MEP_QUOTE, Some(60.0), None, None, None));
        push(&log, market_data_json(NOTE, Some(120.0), Some(119.5), Some(120.5), None));
        push(&log, market_data_json(CALL, None, Some(3.0), Some(3.5), None));
        push(&log, market_data_json(PUT, None, Some(2.0), Some(2.5), None));

        let snapshot = engine.run_cycle(date!(2025 - 10 - 01)).await;

        assert!(snapshot.connected);
        assert_eq!(snapshot.underlying.last, Some(100.0));
        assert_eq!(snapshot.mep.last, Some(1300.0));
        assert_eq!(snapshot.reference.price, Some(1250.0));
        let bands = snapshot.bands.unwrap();
        assert!((bands.floor - 940.0).abs() < 1e-9);
        assert!((bands.ceiling - 1484.0).abs() < 1e-9);

        assert_eq!(snapshot.notes.len(), 1);
        let note = &snapshot.notes[0];
        assert_eq!(note.code, "S31O5");
        assert_eq!(note.days_to_maturity, 29);
        assert!(note.tna.is_some());
        assert!(note.mep_fair_value.is_some());

        assert_eq!(snapshot.chain.rows.len(), 1);
        let row = &snapshot.chain.rows[0];
        assert_eq!(row.strike.as_f64(), 100.0);
        assert!(row.call.as_ref().unwrap().bid_iv.is_some());
        assert!(row.put.as_ref().unwrap().ask_iv.is_some());

        // instruments are subscribed automatically
        for symbol in [UNDERLYING, MEP_BASE, MEP_QUOTE] {
            assert!(snapshot.subscriptions.iter().any(|s| s == symbol));
        }
        assert_eq!(snapshot.metrics.quotes_applied, 6);
        assert_eq!(snapshot.metrics.cycles, 1);

        std::fs::remove_file(&config.persistence.tickers_path).ok();
        std::fs::remove_file(&config.persistence.panel_path).ok();
    }
}
