//! Least-squares trend forecaster
//!
//! Fits a line through the most recent observations and extrapolates one
//! step. With too few observations it falls back to their mean.

use super::{OracleError, PriceOracle};
use crate::core::{is_valid_price, MIN_PRICE};

/// Points used for the line fit
pub const TREND_WINDOW: usize = 7;

/// Observations required before the line fit is used
pub const MIN_TREND_POINTS: usize = TREND_WINDOW + 1;

/// One-step forecast and how it was derived
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Forecast {
    /// Line fit over the last [`TREND_WINDOW`] observations
    Trend { price: f64, slope: f64 },
    /// Mean of the available observations (not enough data for a fit)
    MovingAverage { price: f64, window: usize },
}

impl Forecast {
    #[inline]
    pub fn price(&self) -> f64 {
        match *self {
            Forecast::Trend { price, .. } | Forecast::MovingAverage { price, .. } => price,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TrendOracle;

impl TrendOracle {
    pub fn new() -> Self {
        Self
    }

    /// Forecast the next price.
    ///
    /// Observations are the history (oldest first) followed by the current
    /// price. The result is floored at [`MIN_PRICE`].
    pub fn forecast(&self, current_price: f64, history: &[f64]) -> Forecast {
        let total = history.len() + 1;
        let observations = history.iter().copied().chain(std::iter::once(current_price));

        if total >= MIN_TREND_POINTS {
            let window: Vec<f64> = observations.skip(total - TREND_WINDOW).collect();
            let (slope, intercept) = least_squares(&window);
            let next = intercept + slope * window.len() as f64;
            Forecast::Trend {
                price: next.max(MIN_PRICE),
                slope,
            }
        } else {
            let window = total.min(TREND_WINDOW);
            let mean = observations.skip(total - window).sum::<f64>() / window as f64;
            Forecast::MovingAverage {
                price: mean.max(MIN_PRICE),
                window,
            }
        }
    }
}

/// Slope and intercept of the least-squares line through `(i, ys[i])`
fn least_squares(ys: &[f64]) -> (f64, f64) {
    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }

    let slope = if var > 0.0 { cov / var } else { 0.0 };
    (slope, mean_y - slope * mean_x)
}

impl PriceOracle for TrendOracle {
    fn generate_next_price(&self, current_price: f64, history: &[f64]) -> Result<f64, OracleError> {
        if !is_valid_price(current_price) {
            return Err(OracleError::InvalidInput(current_price));
        }
        let price = self.forecast(current_price, history).price();
        if !is_valid_price(price) {
            return Err(OracleError::InvalidOutput(price));
        }
        Ok(price)
    }

    fn name(&self) -> &'static str {
        "trend"
    }
}
