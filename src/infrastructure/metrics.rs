//! Metrics collection for system monitoring
//!
//! Lock-free counters using atomic operations.
//! Updated by the engine, hub and trade path; exported via /api/status.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Market metrics collector
///
/// Thread-safe counters. Snapshots taken for API export.
pub struct MetricsCollector {
    /// Completed price ticks
    ticks: AtomicU64,
    /// Instrument prices moved
    price_updates: AtomicU64,
    /// Per-instrument oracle failures (instrument left unchanged)
    oracle_failures: AtomicU64,
    trades_accepted: AtomicU64,
    trades_rejected: AtomicU64,
    /// Snapshots handed to the hub
    snapshots_published: AtomicU64,
    /// Live subscribers
    subscribers: AtomicU64,
    /// Subscribers removed because their channel closed
    subscribers_dropped: AtomicU64,
    /// Deliveries skipped because a subscriber queue was full
    lagged_deliveries: AtomicU64,
    /// Last tick timestamp (Unix millis)
    last_tick_time: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for API export
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub price_updates: u64,
    pub oracle_failures: u64,
    pub trades_accepted: u64,
    pub trades_rejected: u64,
    pub snapshots_published: u64,
    pub subscribers: u64,
    pub subscribers_dropped: u64,
    pub lagged_deliveries: u64,
    /// Unix millis of the last tick, 0 before the first one
    pub last_tick_ms: u64,
    pub uptime_seconds: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            price_updates: AtomicU64::new(0),
            oracle_failures: AtomicU64::new(0),
            trades_accepted: AtomicU64::new(0),
            trades_rejected: AtomicU64::new(0),
            snapshots_published: AtomicU64::new(0),
            subscribers: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            lagged_deliveries: AtomicU64::new(0),
            last_tick_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finished tick and how many instruments moved / failed
    #[inline]
    pub fn record_tick(&self, updated: u64, failed: u64) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.price_updates.fetch_add(updated, Ordering::Relaxed);
        self.oracle_failures.fetch_add(failed, Ordering::Relaxed);

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_tick_time.store(now, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trade_accepted(&self) {
        self.trades_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_trade_rejected(&self) {
        self.trades_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_snapshot_published(&self) {
        self.snapshots_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record snapshots skipped for lagging subscribers
    #[inline]
    pub fn record_lagged(&self, count: u64) {
        self.lagged_deliveries.fetch_add(count, Ordering::Relaxed);
    }

    /// Record dropped subscribers (closed channels)
    #[inline]
    pub fn record_subscribers_dropped(&self, count: u64) {
        self.subscribers_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Set current subscriber count
    #[inline]
    pub fn set_subscribers(&self, count: usize) {
        self.subscribers.store(count as u64, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            price_updates: self.price_updates.load(Ordering::Relaxed),
            oracle_failures: self.oracle_failures.load(Ordering::Relaxed),
            trades_accepted: self.trades_accepted.load(Ordering::Relaxed),
            trades_rejected: self.trades_rejected.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            subscribers: self.subscribers.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            lagged_deliveries: self.lagged_deliveries.load(Ordering::Relaxed),
            last_tick_ms: self.last_tick_time.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
