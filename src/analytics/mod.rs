//! Market Analytics
//!
//! Stateless rankings over instrument history, recomputed on every call.
//! Instruments without enough history are left out of a ranking rather
//! than reported with a made-up score.

pub mod stats;

use crate::core::InstrumentId;
use crate::infrastructure::config::AnalyticsConfig;
use crate::ledger::LedgerStore;
use crate::oracle::{Forecast, TrendOracle};
use serde::Serialize;
use std::sync::Arc;
use stats::{pct_change, population_std_dev, rank_desc};

/// Price move since the most recent history point
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingEntry {
    pub instrument_id: InstrumentId,
    pub name: String,
    pub current_price: f64,
    pub previous_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolatilityEntry {
    pub instrument_id: InstrumentId,
    pub name: String,
    pub current_price: f64,
    /// Population std-dev of the recent history window
    pub volatility: f64,
    /// History points the figure is based on
    pub points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Trend,
    MovingAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookEntry {
    pub instrument_id: InstrumentId,
    pub name: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub potential_return_pct: f64,
    pub method: ForecastMethod,
}

pub struct MarketAnalytics {
    ledger: Arc<LedgerStore>,
    config: AnalyticsConfig,
    forecaster: TrendOracle,
}

impl MarketAnalytics {
    pub fn new(ledger: Arc<LedgerStore>, config: AnalyticsConfig) -> Self {
        Self {
            ledger,
            config,
            forecaster: TrendOracle::new(),
        }
    }

    pub fn default_limit(&self) -> usize {
        self.config.default_limit
    }

    /// Largest percentage moves from the last history point to the live price.
    ///
    /// Instruments with fewer than two history points are excluded.
    pub fn trending(&self, limit: usize) -> Vec<TrendingEntry> {
        let entries = self
            .ledger
            .instruments()
            .into_iter()
            .filter(|inst| inst.history().len() >= 2)
            .filter_map(|inst| {
                let previous = inst.history().last()?;
                let current = inst.current_price();
                Some(TrendingEntry {
                    instrument_id: inst.id,
                    price_change: current - previous,
                    price_change_pct: pct_change(previous, current)?,
                    current_price: current,
                    previous_price: previous,
                    name: inst.name,
                })
            })
            .collect();

        rank_desc(entries, limit, |e| e.price_change_pct)
    }

    /// Most volatile instruments over the recent history window
    pub fn volatility(&self, limit: usize) -> Vec<VolatilityEntry> {
        let min_points = self.config.min_volatility_points.max(1);
        let entries = self
            .ledger
            .instruments()
            .into_iter()
            .filter_map(|inst| {
                let window: Vec<f64> = inst
                    .history()
                    .recent(self.config.volatility_window)
                    .copied()
                    .collect();
                if window.len() < min_points {
                    return None;
                }
                Some(VolatilityEntry {
                    instrument_id: inst.id,
                    current_price: inst.current_price(),
                    volatility: population_std_dev(&window)?,
                    points: window.len(),
                    name: inst.name,
                })
            })
            .collect();

        rank_desc(entries, limit, |e| e.volatility)
    }

    /// Highest forecast return from the trend forecaster
    pub fn outlook(&self, limit: usize) -> Vec<OutlookEntry> {
        let entries = self
            .ledger
            .instruments()
            .into_iter()
            .filter_map(|inst| {
                let current = inst.current_price();
                let forecast = self.forecaster.forecast(current, &inst.history().to_vec());
                let method = match forecast {
                    Forecast::Trend { .. } => ForecastMethod::Trend,
                    Forecast::MovingAverage { .. } => ForecastMethod::MovingAverage,
                };
                Some(OutlookEntry {
                    instrument_id: inst.id,
                    current_price: current,
                    predicted_price: forecast.price(),
                    potential_return_pct: pct_change(current, forecast.price())?,
                    method,
                    name: inst.name,
                })
            })
            .collect();

        rank_desc(entries, limit, |e| e.potential_return_pct)
    }
}
