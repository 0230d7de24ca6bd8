//! Configuration management for the desk
//!
//! Loads configuration from config.toml at startup.
//! Every section is optional; missing values fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Desk configuration
///
/// Loaded from config.toml at startup. Contains all tunable parameters
/// to avoid hardcoded values throughout the codebase.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub desk: DeskConfig,

    #[serde(default)]
    pub instruments: InstrumentsConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub reference: ReferenceConfig,

    #[serde(default)]
    pub bands: BandsConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Discount note reference table
    #[serde(default = "default_notes")]
    pub notes: Vec<NoteEntry>,
}

/// Cycle task settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeskConfig {
    /// Recomputation period in milliseconds
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,

    /// Maximum messages drained per cycle
    #[serde(default = "default_drain_limit")]
    pub drain_limit: usize,

    /// Offset of the trading calendar from UTC, used to date each cycle
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i8,
}

/// Instrument symbols the desk always follows
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstrumentsConfig {
    #[serde(default = "default_underlying")]
    pub underlying: String,

    /// Peso-settled leg of the MEP pair
    #[serde(default = "default_mep_base")]
    pub mep_base: String,

    /// Dollar-settled leg of the MEP pair
    #[serde(default = "default_mep_quote")]
    pub mep_quote: String,
}

/// Initial option chain parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    #[serde(default = "default_days_to_expiry")]
    pub days_to_expiry: u32,

    /// Annual risk-free rate, percent
    #[serde(default = "default_risk_free_rate_pct")]
    pub risk_free_rate_pct: f64,

    /// Annual dividend yield, percent
    #[serde(default)]
    pub dividend_yield_pct: f64,
}

/// External reference quote lookup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferenceConfig {
    #[serde(default = "default_reference_url")]
    pub url: String,

    /// Cache lifetime in seconds
    #[serde(default = "default_reference_ttl_secs")]
    pub cache_secs: u64,

    /// HTTP timeout in milliseconds
    #[serde(default = "default_reference_timeout_ms")]
    pub timeout_ms: u64,
}

/// Regulatory band schedule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BandsConfig {
    /// First month of the schedule, `YYYY-MM`
    #[serde(default = "default_band_epoch")]
    pub epoch: String,

    #[serde(default = "default_band_floor_base")]
    pub floor_base: f64,

    #[serde(default = "default_band_ceiling_base")]
    pub ceiling_base: f64,

    /// Monthly widening as a fraction (0.01 = 1%)
    #[serde(default = "default_band_monthly_step")]
    pub monthly_step: f64,
}

/// File locations for persisted user state
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_tickers_path")]
    pub tickers_path: PathBuf,

    #[serde(default = "default_panel_path")]
    pub panel_path: PathBuf,
}

/// Feed source
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedConfig {
    /// Newline-delimited payload file to replay instead of a live connection
    #[serde(default)]
    pub replay_path: Option<PathBuf>,

    /// Delay between replayed payloads in milliseconds
    #[serde(default)]
    pub replay_pace_ms: u64,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

/// One discount note: code, maturity (`YYYY-MM-DD`) and redemption value
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NoteEntry {
    pub code: String,
    pub maturity: String,
    pub redemption: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            desk: DeskConfig::default(),
            instruments: InstrumentsConfig::default(),
            chain: ChainConfig::default(),
            reference: ReferenceConfig::default(),
            bands: BandsConfig::default(),
            persistence: PersistenceConfig::default(),
            feed: FeedConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            notes: default_notes(),
        }
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: default_cycle_interval_ms(),
            drain_limit: default_drain_limit(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl DeskConfig {
    /// Current date on the trading calendar
    pub fn today(&self) -> time::Date {
        let offset = time::UtcOffset::from_hms(self.utc_offset_hours, 0, 0).unwrap_or(time::UtcOffset::UTC);
        time::OffsetDateTime::now_utc().to_offset(offset).date()
    }
}

impl Default for InstrumentsConfig {
    fn default() -> Self {
        Self {
            underlying: default_underlying(),
            mep_base: default_mep_base(),
            mep_quote: default_mep_quote(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            days_to_expiry: default_days_to_expiry(),
            risk_free_rate_pct: default_risk_free_rate_pct(),
            dividend_yield_pct: 0.0,
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            url: default_reference_url(),
            cache_secs: default_reference_ttl_secs(),
            timeout_ms: default_reference_timeout_ms(),
        }
    }
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            epoch: default_band_epoch(),
            floor_base: default_band_floor_base(),
            ceiling_base: default_band_ceiling_base(),
            monthly_step: default_band_monthly_step(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            tickers_path: default_tickers_path(),
            panel_path: default_panel_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_api_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
        }
    }
}

fn default_cycle_interval_ms() -> u64 {
    500
}

fn default_drain_limit() -> usize {
    crate::feed::DEFAULT_DRAIN_LIMIT
}

fn default_utc_offset_hours() -> i8 {
    -3
}

fn default_underlying() -> String {
    "MERV - XMEV - GGAL - 24hs".to_string()
}

fn default_mep_base() -> String {
    "MERV - XMEV - AL30 - 24hs".to_string()
}

fn default_mep_quote() -> String {
    "MERV - XMEV - AL30D - 24hs".to_string()
}

fn default_days_to_expiry() -> u32 {
    30
}

fn default_risk_free_rate_pct() -> f64 {
    60.0
}

fn default_reference_url() -> String {
    "https://api.marketdata.mae.com.ar/api/mercado/resumen/FOR".to_string()
}

fn default_reference_ttl_secs() -> u64 {
    30
}

fn default_reference_timeout_ms() -> u64 {
    4000
}

fn default_band_epoch() -> String {
    "2025-04".to_string()
}

fn default_band_floor_base() -> f64 {
    1000.0
}

fn default_band_ceiling_base() -> f64 {
    1400.0
}

fn default_band_monthly_step() -> f64 {
    0.01
}

fn default_tickers_path() -> PathBuf {
    PathBuf::from("tickers_saved.txt")
}

fn default_panel_path() -> PathBuf {
    PathBuf::from("panel_settings.json")
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    5000
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

/// Built-in discount note table
pub fn default_notes() -> Vec<NoteEntry> {
    const NOTES: &[(&str, &str, f64)] = &[
        ("S15G5", "2025-08-19", 146.794496767123),
        ("S29G5", "2025-08-29", 157.700710502466),
        ("S12S5", "2025-09-12", 158.976578936986),
        ("S30S5", "2025-09-30", 159.735473315069),
        ("T17O5", "2025-10-17", 158.870918136986),
        ("S31O5", "2025-10-31", 132.819735616438),
        ("S10N5", "2025-11-10", 122.252745205479),
        ("S28N5", "2025-11-28", 123.55976460274),
        ("T15D5", "2025-12-15", 170.838755342466),
        ("T30E6", "2026-01-30", 142.220193575342),
        ("T13F6", "2026-02-13", 144.962705479452),
        ("S29Y6", "2026-05-29", 132.045967123288),
        ("T30J6", "2026-06-30", 144.89499),
        ("TO26", "2026-10-17", 123.0),
        ("T15E7", "2027-01-15", 161.107234493151),
        ("TY30P", "2030-05-30", 253.533251506849),
    ];

    NOTES
        .iter()
        .map(|&(code, maturity, redemption)| NoteEntry {
            code: code.to_string(),
            maturity: maturity.to_string(),
            redemption,
        })
        .collect()
}

impl Config {
    /// Load configuration from config.toml file
    ///
    /// The path comes from `CONFIG_PATH`, falling back to `config.toml`.
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load from an explicit path with the same fallback rules as [`Config::load`]
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(Config::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid TOML or wrong value types
    #[error("Failed to parse config: {0}")]
    Parse(String),
}
