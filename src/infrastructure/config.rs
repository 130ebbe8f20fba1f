//! Configuration management
//!
//! Loads configuration from config.toml at startup (path overridable with
//! `CONFIG_PATH`). Every field has a default so a missing file or a partial
//! file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Market configuration, one section per component
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub roster: RosterConfig,
}

/// Which price oracle drives ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    #[default]
    RandomWalk,
    Trend,
}

/// Price engine cadences and oracle selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Seconds between price ticks
    #[serde(default = "default_price_interval_secs")]
    pub price_interval_secs: u64,

    /// Milliseconds between snapshot broadcasts
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,

    /// Delay before the loop resumes after a failed pass
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Relative std-dev of one random-walk step (0.01 = 1%)
    #[serde(default = "default_volatility")]
    pub volatility: f64,

    /// Fixed seed for reproducible walks and demo rosters
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub oracle: OracleKind,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// Balance of accounts opened without an explicit one
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,

    /// Directory of per-account JSON-lines journals; `None` keeps the ledger in memory only
    #[serde(default)]
    pub journal_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyticsConfig {
    /// Instruments with fewer history points are left out of volatility rankings
    #[serde(default = "default_min_volatility_points")]
    pub min_volatility_points: usize,

    /// Most recent history points used for volatility
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,

    /// Ranking size when a request gives no limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Port for HTTP API server
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Path to static files (frontend)
    #[serde(default = "default_static_path")]
    pub static_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HubConfig {
    /// Snapshots queued per subscriber before deliveries are skipped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// EnvFilter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Startup roster. Empty lists fall back to generated data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RosterConfig {
    /// Instruments generated when `instruments` is empty
    #[serde(default = "default_demo_instruments")]
    pub demo_instruments: usize,

    #[serde(default)]
    pub instruments: Vec<InstrumentEntry>,

    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstrumentEntry {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub position: String,
    pub price: f64,
    /// Prior prices, oldest first
    #[serde(default)]
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountEntry {
    pub id: u32,
    pub name: String,
    /// Defaults to `ledger.starting_balance`
    #[serde(default)]
    pub balance: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            price_interval_secs: default_price_interval_secs(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            retry_delay_secs: default_retry_delay_secs(),
            volatility: default_volatility(),
            seed: None,
            oracle: OracleKind::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            journal_dir: None,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            min_volatility_points: default_min_volatility_points(),
            volatility_window: default_volatility_window(),
            default_limit: default_limit(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            static_path: default_static_path(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            demo_instruments: default_demo_instruments(),
            instruments: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

fn default_price_interval_secs() -> u64 {
    60
}

fn default_broadcast_interval_ms() -> u64 {
    1_000
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_volatility() -> f64 {
    0.01
}

fn default_starting_balance() -> f64 {
    10_000.0
}

fn default_min_volatility_points() -> usize {
    2
}

fn default_volatility_window() -> usize {
    10
}

fn default_limit() -> usize {
    5
}

fn default_api_port() -> u16 {
    8000
}

fn default_static_path() -> PathBuf {
    PathBuf::from("frontend/dist")
}

fn default_channel_capacity() -> usize {
    16
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_demo_instruments() -> usize {
    50
}

impl EngineConfig {
    #[inline]
    pub fn price_interval(&self) -> Duration {
        Duration::from_secs(self.price_interval_secs)
    }

    #[inline]
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    #[inline]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl MarketConfig {
    /// Load configuration from `CONFIG_PATH` or config.toml
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be read, parsed or validated.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::from_toml(&contents)?,
            // File not found - use defaults
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MarketConfig::default(),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.price_interval_secs == 0 {
            return Err(ConfigError::Invalid("engine.price_interval_secs must be > 0".into()));
        }
        if engine.broadcast_interval_ms == 0 {
            return Err(ConfigError::Invalid("engine.broadcast_interval_ms must be > 0".into()));
        }
        if !(engine.volatility.is_finite() && engine.volatility > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "engine.volatility must be positive, got {}",
                engine.volatility
            )));
        }
        if !(self.ledger.starting_balance.is_finite() && self.ledger.starting_balance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "ledger.starting_balance must be >= 0, got {}",
                self.ledger.starting_balance
            )));
        }
        if self.hub.channel_capacity == 0 {
            return Err(ConfigError::Invalid("hub.channel_capacity must be > 0".into()));
        }
        if self.analytics.volatility_window == 0 {
            return Err(ConfigError::Invalid("analytics.volatility_window must be > 0".into()));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.engine.price_interval(), Duration::from_secs(60));
        assert_eq!(config.engine.broadcast_interval(), Duration::from_secs(1));
        assert_eq!(config.engine.volatility, 0.01);
        assert_eq!(config.engine.oracle, OracleKind::RandomWalk);
        assert_eq!(config.ledger.starting_balance, 10_000.0);
        assert_eq!(config.analytics.min_volatility_points, 2);
        assert_eq!(config.analytics.volatility_window, 10);
        assert_eq!(config.roster.demo_instruments, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MarketConfig::from_toml(
            r#"
            [engine]
            price_interval_secs = 5
            oracle = "trend"
            seed = 11

            [[roster.accounts]]
            id = 3
            name = "carol"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.price_interval_secs, 5);
        assert_eq!(config.engine.broadcast_interval_ms, 1_000);
        assert_eq!(config.engine.oracle, OracleKind::Trend);
        assert_eq!(config.engine.seed, Some(11));
        assert_eq!(config.roster.accounts.len(), 1);
        assert_eq!(config.roster.accounts[0].balance, None);
        assert_eq!(config.api.port, 8000);
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = MarketConfig::default();
        config.engine.broadcast_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = MarketConfig::default();
        config.hub.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = MarketConfig::default();
        config.engine.volatility = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            MarketConfig::from_toml("[engine]\nprice_interval_secs = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MarketConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.api.port, 8000);
    }
}
