//! Test fixtures: a small seeded market wired the way the binary wires it

use crate::analytics::MarketAnalytics;
use crate::broadcast::BroadcastHub;
use crate::core::{AccountId, Instrument, InstrumentId};
use crate::infrastructure::api::AppState;
use crate::infrastructure::config::AnalyticsConfig;
use crate::infrastructure::metrics::MetricsCollector;
use crate::ledger::{Account, LedgerStore, TradeProcessor};
use std::sync::Arc;

pub const DEMO_ACCOUNT: AccountId = AccountId::from_raw(1);
pub const LEBRON: InstrumentId = InstrumentId::from_raw(1);
pub const CURRY: InstrumentId = InstrumentId::from_raw(2);
pub const JOKIC: InstrumentId = InstrumentId::from_raw(3);

pub struct Fixture {
    pub ledger: Arc<LedgerStore>,
    pub metrics: Arc<MetricsCollector>,
    pub hub: Arc<BroadcastHub>,
    pub trades: TradeProcessor,
    pub analytics: Arc<MarketAnalytics>,
}

impl Fixture {
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

/// Three instruments (one without history) and one account holding 10000
pub fn fixture() -> Fixture {
    let ledger = Arc::new(LedgerStore::in_memory());
    let instruments = [
        Instrument::new(LEBRON, "LeBron James", 100.0)
            .with_details("LAL", "F")
            .with_history([95.0, 98.0]),
        Instrument::new(CURRY, "Stephen Curry", 50.0)
            .with_details("GSW", "G")
            .with_history([52.0, 51.0, 50.5]),
        Instrument::new(JOKIC, "Nikola Jokic", 80.0).with_details("DEN", "C"),
    ];
    for instrument in instruments {
        ledger.add_instrument(instrument).unwrap();
    }
    ledger
        .add_account(Account::new(DEMO_ACCOUNT, "demo", 10_000.0))
        .unwrap();

    let metrics = Arc::new(MetricsCollector::new());
    let hub = Arc::new(BroadcastHub::new(8, metrics.clone()));
    let trades = TradeProcessor::new(ledger.clone(), metrics.clone());
    let analytics = Arc::new(MarketAnalytics::new(ledger.clone(), AnalyticsConfig::default()));

    Fixture {
        ledger,
        metrics,
        hub,
        trades,
        analytics,
    }
}
