//! Persisted user state
//!
//! Two small files survive restarts:
//! - the subscription list, one symbol per line
//! - the panel selection, pretty-printed JSON with `calls` and `puts`
//!
//! Both are overwritten in full on every change.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Subscription list file
#[derive(Debug, Clone)]
pub struct TickerFile {
    path: PathBuf,
}

impl TickerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved symbols, trimmed, blanks dropped
    ///
    /// A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<String>, PersistenceError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PersistenceError::io(&self.path, e)),
        }
    }

    /// Overwrite the file with `symbols`, one per line
    pub fn save(&self, symbols: &[String]) -> Result<(), PersistenceError> {
        let contents = symbols
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&self.path, contents).map_err(|e| PersistenceError::io(&self.path, e))
    }
}

/// Saved option selection for the chain panel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    #[serde(default, alias = "ggal_calls")]
    pub calls: Vec<String>,
    #[serde(default, alias = "ggal_puts")]
    pub puts: Vec<String>,
}

impl PanelSettings {
    /// Read settings from `path`; a missing file gives empty selections
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| PersistenceError::Json {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    /// Like [`PanelSettings::load`] but falls back to empty selections on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable panel settings: {}", e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| PersistenceError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|e| PersistenceError::io(path, e))
    }
}
