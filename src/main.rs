//! Quote ingestion and analytics desk
//!
//! # Architecture
//! - **core**: Market state store, symbol rules, note table
//! - **feed**: Producer-facing queue, payload parsing, ingestion
//! - **analytics**: Implied volatility, option chain, discount notes
//! - **engine**: Single cycle task owning all mutable state
//! - **infrastructure**: Config, logging, metrics, persistence, reference quote, api

use parking_lot::RwLock;
use quote_desk::engine::{DeskCommand, DeskEngine, DeskSnapshot};
use quote_desk::feed::{MarketDataFeed, ReplayFeed};
use quote_desk::infrastructure::logging::init_logging;
use quote_desk::infrastructure::metrics::MetricsCollector;
use quote_desk::infrastructure::{start_server, AppState, HttpReferenceSource};
use quote_desk::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Pending commands from the API before senders start waiting
const COMMAND_BUFFER: usize = 64;

/// Main application state
pub struct DeskApp {
    config: Config,
}

impl DeskApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the cycle loop until Ctrl-C
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("Starting quote desk...");
        let config = self.config;

        // 1. Core components
        let metrics = Arc::new(MetricsCollector::new());
        let reference = HttpReferenceSource::new(
            config.reference.url.clone(),
            Duration::from_millis(config.reference.timeout_ms),
        )?;

        let feed: Option<Box<dyn MarketDataFeed>> = match &config.feed.replay_path {
            Some(path) => {
                tracing::info!("Replaying feed from {}", path.display());
                Some(Box::new(ReplayFeed::new(
                    path.clone(),
                    Duration::from_millis(config.feed.replay_pace_ms),
                )))
            }
            None => {
                tracing::warn!("No feed configured; running on persisted state only");
                None
            }
        };

        let desk_config = config.desk.clone();
        let cycle_interval = Duration::from_millis(config.desk.cycle_interval_ms.max(1));
        let api_config = config.api.clone();

        let mut engine = DeskEngine::new(config, feed, reference, Arc::clone(&metrics))?;
        if let Err(e) = engine.connect() {
            tracing::error!("Feed connection failed: {}", e);
        }

        // 2. API server (reads snapshots, sends commands)
        let snapshot = Arc::new(RwLock::new(DeskSnapshot::default()));
        let (tx, mut rx) = mpsc::channel::<DeskCommand>(COMMAND_BUFFER);

        if api_config.enabled {
            let state = AppState {
                snapshot: Arc::clone(&snapshot),
                commands: tx,
            };
            tokio::spawn(async move {
                if let Err(e) = start_server(state, &api_config).await {
                    tracing::error!("API Server failed: {}", e);
                }
            });
        } else {
            drop(tx);
        }

        // 3. Cycle loop
        let mut interval = tokio::time::interval(cycle_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let next = engine.run_cycle(desk_config.today()).await;
                    *snapshot.write() = next;
                }
                command = rx.recv(), if commands_open => match command {
                    Some(command) => engine.handle_command(command),
                    None => commands_open = false,
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        engine.disconnect();
        tracing::info!("Quote desk stopped");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config or use defaults
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration ({}); using defaults", e);
            Config::default()
        }
    };

    // Guards flush the file appenders on exit
    let _guards = init_logging(&config.logging.directory)?;

    DeskApp::new(config).run().await
}
