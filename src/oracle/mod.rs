//! Price oracles
//!
//! The price engine asks an oracle for every instrument's next price on
//! each tick. Oracles are pure with respect to the ledger: they see the
//! current price and the prior prices (oldest first) and return a candidate.

pub mod random_walk;
pub mod trend;

pub use random_walk::RandomWalkOracle;
pub use trend::{Forecast, TrendOracle};

use crate::infrastructure::config::{EngineConfig, OracleKind};
use std::sync::Arc;
use thiserror::Error;

/// Oracle failure. The affected instrument keeps its price for the tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("invalid current price {0}")]
    InvalidInput(f64),

    #[error("oracle produced unusable price {0}")]
    InvalidOutput(f64),

    #[error("invalid oracle parameter: {0}")]
    InvalidParameter(String),

    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

/// Source of next prices
pub trait PriceOracle: Send + Sync {
    /// Candidate next price for an instrument currently at `current_price`
    fn generate_next_price(&self, current_price: f64, history: &[f64]) -> Result<f64, OracleError>;

    /// Short name for logs and status output
    fn name(&self) -> &'static str;
}

/// Build the oracle selected in the engine configuration
pub fn build_oracle(config: &EngineConfig) -> Result<Arc<dyn PriceOracle>, OracleError> {
    Ok(match config.oracle {
        OracleKind::RandomWalk => Arc::new(RandomWalkOracle::new(config.volatility, config.seed)?),
        OracleKind::Trend => Arc::new(TrendOracle::new()),
    })
}
