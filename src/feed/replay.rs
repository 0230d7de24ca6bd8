//! Replay feed
//!
//! Reads newline-delimited broker payloads from a file on a producer thread and
//! pushes them onto the queue, optionally paced. Lets the desk run without a
//! live broker connection.

use super::queue::FeedQueue;
use super::traits::MarketDataFeed;
use crate::{DeskError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// File-backed feed producer
pub struct ReplayFeed {
    path: PathBuf,
    /// Delay between payloads
    pace: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>, pace: Duration) -> Self {
        Self {
            path: path.into(),
            pace,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl MarketDataFeed for ReplayFeed {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn connect(&mut self, queue: Arc<FeedQueue>) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| {
            DeskError::Feed(format!("cannot open replay file {}: {}", self.path.display(), e))
        })?;

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let pace = self.pace;
        let path = self.path.clone();

        let handle = thread::Builder::new()
            .name("replay-feed".into())
            .spawn(move || {
                let mut pushed = 0usize;
                for line in BufReader::new(file).lines() {
                    if !running.load(Ordering::Acquire) {
                        break;
                    }
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::warn!(target: "feed", "Replay read error: {}", e);
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if queue.push_json(&line) {
                        pushed += 1;
                    }
                    if !pace.is_zero() {
                        thread::sleep(pace);
                    }
                }
                tracing::info!(target: "feed", "Replay of {} finished: {} payloads", path.display(), pushed);
            })?;

        self.handle = Some(handle);
        tracing::info!(target: "feed", "Replay feed connected: {}", self.path.display());
        Ok(())
    }

    fn subscribe(&mut self, symbols: &[String]) -> Result<()> {
        tracing::info!(target: "feed", "Replay subscribe: {} symbols", symbols.len());
        Ok(())
    }

    fn unsubscribe(&mut self, symbols: &[String]) -> Result<()> {
        tracing::info!(target: "feed", "Replay unsubscribe: {} symbols", symbols.len());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(target: "feed", "Replay thread panicked");
            }
        }
    }
}

impl Drop for ReplayFeed {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{market_data_json, scratch_path};

    #[test]
    fn test_replay_pushes_payloads() {
        let path = scratch_path("replay.ndjson");
        let contents = format!(
            "{}\n\nnot json\n{}\n",
            market_data_json("X", Some(1.0), None, None, None),
            market_data_json("X", Some(2.0), None, None, None),
        );
        std::fs::write(&path, contents).unwrap();

        let queue = Arc::new(FeedQueue::new());
        let mut feed = ReplayFeed::new(&path, Duration::ZERO);
        feed.connect(Arc::clone(&queue)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while queue.len() < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        feed.disconnect();

        assert_eq!(queue.len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_fails_connect() {
        let mut feed = ReplayFeed::new(scratch_path("missing.ndjson"), Duration::ZERO);
        let err = feed.connect(Arc::new(FeedQueue::new()));
        assert!(matches!(err, Err(DeskError::Feed(_))));
    }
}
