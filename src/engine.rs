//! Price Engine
//!
//! Runs two cadences in one task:
//! - price tick: every instrument moves to the oracle's next price and the
//!   moved prices are published
//! - broadcast tick: the current prices are republished unchanged
//!
//! Instruments are repriced one at a time under their own lock, so trades
//! on other instruments are never blocked by a tick.

use crate::broadcast::{BroadcastHub, PublishReport};
use crate::core::{InstrumentId, PriceSnapshot};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::metrics::MetricsCollector;
use crate::infrastructure::schedule::{panic_message, ScheduledTask};
use crate::ledger::{LedgerStore, PriceUpdateError};
use crate::log_engine;
use crate::oracle::{OracleError, PriceOracle};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Result of one price tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Instruments whose price moved
    pub updated: usize,
    /// Instruments left unchanged, with the reason
    pub failures: Vec<(InstrumentId, PriceUpdateError)>,
    /// Snapshot of the moved prices (what was published)
    pub snapshot: PriceSnapshot,
}

impl TickReport {
    /// Every instrument failed; nothing moved
    pub fn is_total_failure(&self) -> bool {
        self.updated == 0 && !self.failures.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("price tick failed for all {failures} instruments")]
    TickFailed { failures: usize },
}

/// Scheduled price mutation and snapshot publishing
pub struct PriceEngine {
    ledger: Arc<LedgerStore>,
    oracle: Arc<dyn PriceOracle>,
    hub: Arc<BroadcastHub>,
    metrics: Arc<MetricsCollector>,
    config: EngineConfig,
}

impl PriceEngine {
    pub fn new(
        ledger: Arc<LedgerStore>,
        oracle: Arc<dyn PriceOracle>,
        hub: Arc<BroadcastHub>,
        metrics: Arc<MetricsCollector>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            oracle,
            hub,
            metrics,
            config,
        }
    }

    /// Reprice every instrument once and publish the moved prices.
    ///
    /// A failing or panicking instrument is logged and skipped; the others
    /// still move.
    pub fn tick(&self) -> TickReport {
        let now = OffsetDateTime::now_utc();
        let mut report = TickReport::default();

        for id in self.ledger.instrument_ids() {
            let result = self.ledger.reprice(id, now, |current, history| {
                // A panicking oracle fails only this instrument
                panic::catch_unwind(AssertUnwindSafe(|| {
                    self.oracle.generate_next_price(current, history)
                }))
                .unwrap_or_else(|payload| {
                    Err(OracleError::Unavailable(format!(
                        "oracle panicked: {}",
                        panic_message(payload)
                    )))
                })
            });
            match result {
                Ok(change) => {
                    report.updated += 1;
                    report.snapshot.insert(change.name, change.current);
                }
                Err(e) => {
                    log_engine!(
                        Level::WARN,
                        instrument = id.as_raw(),
                        oracle = self.oracle.name(),
                        "price update skipped: {}",
                        e
                    );
                    report.failures.push((id, e));
                }
            }
        }

        self.metrics
            .record_tick(report.updated as u64, report.failures.len() as u64);

        if !report.snapshot.is_empty() {
            let delivery = self.hub.publish(report.snapshot.clone());
            log_engine!(
                Level::DEBUG,
                updated = report.updated,
                failed = report.failures.len(),
                delivered = delivery.delivered,
                lagged = delivery.lagged,
                "price tick published"
            );
        }
        report
    }

    /// Current price of every instrument, keyed by name
    pub fn current_snapshot(&self) -> PriceSnapshot {
        self.ledger
            .instruments()
            .into_iter()
            .map(|inst| {
                let price = inst.current_price();
                (inst.name, price)
            })
            .collect()
    }

    /// Republish current prices without moving them
    pub fn publish_current(&self) -> PublishReport {
        self.hub.publish(self.current_snapshot())
    }

    /// Both cadences until cancelled. Returns only on a whole-tick failure.
    async fn run_cadences(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        let mut price_timer = tokio::time::interval(self.config.price_interval());
        price_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut broadcast_timer = tokio::time::interval(self.config.broadcast_interval());
        broadcast_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = price_timer.tick() => {
                    let report = self.tick();
                    if report.is_total_failure() {
                        return Err(EngineError::TickFailed { failures: report.failures.len() });
                    }
                }
                _ = broadcast_timer.tick() => {
                    self.publish_current();
                }
            }
        }
    }

    /// Spawn the engine loop. A whole-tick failure restarts the loop after
    /// the configured retry delay; cancellation stops it.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<u32> {
        log_engine!(
            Level::INFO,
            oracle = self.oracle.name(),
            price_interval_secs = self.config.price_interval_secs,
            broadcast_interval_ms = self.config.broadcast_interval_ms,
            instruments = self.ledger.instrument_count(),
            "price engine starting"
        );

        let task = ScheduledTask::new("price_engine", self.config.retry_delay(), cancel.clone());
        task.spawn(move || {
            let engine = self.clone();
            let cancel = cancel.clone();
            async move { engine.run_cadences(&cancel).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Instrument;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Multiplies by a fixed factor; fails for prices above `fail_above`
    /// and panics for prices above `panic_above`
    struct StepOracle {
        factor: f64,
        fail_above: f64,
        panic_above: f64,
        calls: AtomicU32,
    }

    impl StepOracle {
        fn new(factor: f64, fail_above: f64) -> Self {
            Self {
                factor,
                fail_above,
                panic_above: f64::MAX,
                calls: AtomicU32::new(0),
            }
        }

        fn panicking_above(factor: f64, panic_above: f64) -> Self {
            Self {
                panic_above,
                ..Self::new(factor, f64::MAX)
            }
        }
    }

    impl PriceOracle for StepOracle {
        fn generate_next_price(&self, current: f64, history: &[f64]) -> Result<f64, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if current > self.panic_above {
                // Model indexing an empty window
                let window: &[f64] = &history[history.len()..];
                return Ok(window[0]);
            }
            if current > self.fail_above {
                return Err(OracleError::Unavailable("model offline".into()));
            }
            Ok(current * self.factor)
        }

        fn name(&self) -> &'static str {
            "step"
        }
    }

    fn engine(oracle: Arc<dyn PriceOracle>, config: EngineConfig) -> (Arc<PriceEngine>, Arc<BroadcastHub>) {
        let ledger = Arc::new(LedgerStore::in_memory());
        ledger
            .add_instrument(Instrument::new(InstrumentId::from_raw(1), "Cheap", 10.0))
            .unwrap();
        ledger
            .add_instrument(Instrument::new(InstrumentId::from_raw(2), "Pricey", 1_000.0))
            .unwrap();
        let metrics = Arc::new(MetricsCollector::new());
        let hub = Arc::new(BroadcastHub::new(8, metrics.clone()));
        let engine = PriceEngine::new(ledger, oracle, hub.clone(), metrics, config);
        (Arc::new(engine), hub)
    }

    #[test]
    fn test_tick_isolates_failures() {
        let (engine, hub) = engine(Arc::new(StepOracle::new(2.0, 500.0)), EngineConfig::default());
        let mut sub = hub.subscribe();

        let report = engine.tick();
        assert_eq!(report.updated, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, InstrumentId::from_raw(2));
        assert!(!report.is_total_failure());

        let published = sub.receiver.try_recv().unwrap();
        assert_eq!(published.get("Cheap"), Some(20.0));
        assert_eq!(published.get("Pricey"), None);

        let pricey = engine.ledger.instrument(InstrumentId::from_raw(2)).unwrap();
        assert_eq!(pricey.current_price(), 1_000.0);
        assert!(pricey.history().is_empty());
    }

    #[test]
    fn test_tick_survives_panicking_oracle() {
        let (engine, hub) = engine(
            Arc::new(StepOracle::panicking_above(2.0, 500.0)),
            EngineConfig::default(),
        );
        let mut sub = hub.subscribe();

        let report = engine.tick();
        assert_eq!(report.updated, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            (id, PriceUpdateError::Oracle(OracleError::Unavailable(_))) if *id == InstrumentId::from_raw(2)
        ));
        assert_eq!(sub.receiver.try_recv().unwrap().get("Cheap"), Some(20.0));

        let pricey = engine.ledger.instrument(InstrumentId::from_raw(2)).unwrap();
        assert_eq!(pricey.current_price(), 1_000.0);

        // Instrument lock was released by the unwind
        assert!(engine.tick().updated >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_keeps_running_with_panicking_oracle() {
        let config = EngineConfig {
            price_interval_secs: 1,
            ..EngineConfig::default()
        };
        let (engine, _hub) = engine(Arc::new(StepOracle::panicking_above(1.5, 500.0)), config);
        let cancel = CancellationToken::new();
        let handle = engine.clone().spawn(cancel.clone());

        // Ticks at t=0..=3
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 0);

        let cheap = engine.ledger.instrument(InstrumentId::from_raw(1)).unwrap();
        assert_eq!(cheap.history().len(), 4);
    }

    #[test]
    fn test_publish_current_does_not_move_prices() {
        let (engine, hub) = engine(Arc::new(StepOracle::new(2.0, f64::MAX)), EngineConfig::default());
        let mut sub = hub.subscribe();

        engine.publish_current();
        let snapshot = sub.receiver.try_recv().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("Pricey"), Some(1_000.0));
        assert!(engine.ledger.instrument(InstrumentId::from_raw(1)).unwrap().history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_both_cadences_until_cancelled() {
        let config = EngineConfig {
            price_interval_secs: 60,
            broadcast_interval_ms: 1_000,
            ..EngineConfig::default()
        };
        let (engine, hub) = engine(Arc::new(StepOracle::new(1.01, f64::MAX)), config);
        let mut sub = hub.subscribe();
        let cancel = CancellationToken::new();
        let handle = engine.clone().spawn(cancel.clone());

        // t=0 price tick, then broadcasts every second
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 0);

        let mut received = 0;
        while sub.receiver.try_recv().is_ok() {
            received += 1;
        }
        assert!(received >= 3, "received {}", received);
        let cheap = engine.ledger.instrument(InstrumentId::from_raw(1)).unwrap();
        assert_eq!(cheap.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_retries_after_delay() {
        let oracle = Arc::new(StepOracle::new(2.0, 0.0));
        let config = EngineConfig {
            price_interval_secs: 60,
            retry_delay_secs: 5,
            ..EngineConfig::default()
        };
        let (engine, _hub) = engine(oracle.clone(), config);
        let cancel = CancellationToken::new();
        let handle = engine.spawn(cancel.clone());

        // Fails at t=0, t=5, t=10
        tokio::time::sleep(Duration::from_millis(12_000)).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 3);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 6);
    }
}
