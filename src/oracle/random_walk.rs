//! Zero-drift relative random walk

use super::{OracleError, PriceOracle};
use crate::core::{is_valid_price, MIN_PRICE};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Default relative std-dev per tick (1%)
pub const DEFAULT_VOLATILITY: f64 = 0.01;

/// `next = current * (1 + N(0, volatility))`, floored at [`MIN_PRICE`]
pub struct RandomWalkOracle {
    step: Normal<f64>,
    rng: Mutex<StdRng>,
}

impl RandomWalkOracle {
    /// `seed` makes the walk reproducible; `None` seeds from OS entropy
    pub fn new(volatility: f64, seed: Option<u64>) -> Result<Self, OracleError> {
        if !(volatility.is_finite() && volatility > 0.0) {
            return Err(OracleError::InvalidParameter(format!(
                "volatility must be positive, got {}",
                volatility
            )));
        }
        let step = Normal::new(0.0, volatility)
            .map_err(|e| OracleError::InvalidParameter(e.to_string()))?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            step,
            rng: Mutex::new(rng),
        })
    }
}

impl PriceOracle for RandomWalkOracle {
    fn generate_next_price(&self, current_price: f64, _history: &[f64]) -> Result<f64, OracleError> {
        if !is_valid_price(current_price) {
            return Err(OracleError::InvalidInput(current_price));
        }
        let change = self.step.sample(&mut *self.rng.lock());
        Ok((current_price * (1.0 + change)).max(MIN_PRICE))
    }

    fn name(&self) -> &'static str {
        "random_walk"
    }
}
