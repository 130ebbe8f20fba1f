//! Athlete stock market core
//!
//! Transactional trading ledger, scheduled price engine and live price
//! broadcast for a simulated market of athlete shares.

pub mod analytics;
pub mod broadcast;
pub mod core;
pub mod engine;
pub mod infrastructure;
pub mod ledger;
pub mod oracle;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use infrastructure::config::{ApiConfig, EngineConfig, MarketConfig};

use thiserror::Error;

/// Main error type surfaced by application wiring
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Configuration error: {0}")]
    Config(#[from] infrastructure::config::ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] oracle::OracleError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MarketError>;
