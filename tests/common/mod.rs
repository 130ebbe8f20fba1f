//! Shared integration-test market

#![allow(dead_code)]

use ballstreet::analytics::MarketAnalytics;
use ballstreet::broadcast::BroadcastHub;
use ballstreet::core::{AccountId, Instrument, InstrumentId};
use ballstreet::engine::PriceEngine;
use ballstreet::infrastructure::config::{AnalyticsConfig, EngineConfig};
use ballstreet::infrastructure::metrics::MetricsCollector;
use ballstreet::infrastructure::AppState;
use ballstreet::ledger::{Account, LedgerStore, TradeProcessor};
use ballstreet::oracle::{OracleError, PriceOracle};
use std::sync::Arc;

/// Returns a scripted price sequence, one per call, then repeats the last
pub struct ScriptedOracle {
    prices: parking_lot::Mutex<std::collections::VecDeque<f64>>,
}

impl ScriptedOracle {
    pub fn new(prices: impl IntoIterator<Item = f64>) -> Self {
        Self {
            prices: parking_lot::Mutex::new(prices.into_iter().collect()),
        }
    }
}

impl PriceOracle for ScriptedOracle {
    fn generate_next_price(&self, current: f64, _history: &[f64]) -> Result<f64, OracleError> {
        let mut prices = self.prices.lock();
        match prices.len() {
            0 => Ok(current),
            1 => Ok(prices[0]),
            _ => Ok(prices.pop_front().unwrap_or(current)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub struct Market {
    pub ledger: Arc<LedgerStore>,
    pub metrics: Arc<MetricsCollector>,
    pub hub: Arc<BroadcastHub>,
    pub trades: TradeProcessor,
    pub analytics: Arc<MarketAnalytics>,
    pub engine: Arc<PriceEngine>,
}

impl Market {
    pub fn new(ledger: LedgerStore, oracle: Arc<dyn PriceOracle>, config: EngineConfig) -> Self {
        let ledger = Arc::new(ledger);
        let metrics = Arc::new(MetricsCollector::new());
        let hub = Arc::new(BroadcastHub::new(64, metrics.clone()));
        let trades = TradeProcessor::new(ledger.clone(), metrics.clone());
        let analytics = Arc::new(MarketAnalytics::new(ledger.clone(), AnalyticsConfig::default()));
        let engine = Arc::new(PriceEngine::new(
            ledger.clone(),
            oracle,
            hub.clone(),
            metrics.clone(),
            config,
        ));
        Self {
            ledger,
            metrics,
            hub,
            trades,
            analytics,
            engine,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            ledger: self.ledger.clone(),
            trades: self.trades.clone(),
            analytics: self.analytics.clone(),
            hub: self.hub.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// One instrument at `price` and `accounts` accounts funded with `balance`
pub fn ledger_with(price: f64, accounts: u32, balance: f64) -> LedgerStore {
    let ledger = LedgerStore::in_memory();
    ledger
        .add_instrument(Instrument::new(InstrumentId::from_raw(1), "Kevin Durant", price))
        .unwrap();
    for id in 1..=accounts {
        ledger
            .add_account(Account::new(AccountId::from_raw(id), format!("trader-{}", id), balance))
            .unwrap();
    }
    ledger
}
