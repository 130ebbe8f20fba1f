//! Broadcast Hub
//!
//! Fans price snapshots out to live subscribers. Every subscriber owns a
//! bounded queue; publishing never waits on a slow consumer.
//! - closed queue: subscriber removed
//! - full queue: this snapshot skipped for that subscriber (lag), subscriber kept
//!
//! Once `close_all` has run the hub stays closed: late subscribers get a
//! stream that has already ended.

use crate::core::PriceSnapshot;
use crate::infrastructure::metrics::MetricsCollector;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

/// Receiving side of a subscription.
///
/// The stream ends (`recv` returns `None`) after `unsubscribe` or `close_all`.
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Arc<PriceSnapshot>>,
}

impl Subscription {
    #[inline]
    pub async fn recv(&mut self) -> Option<Arc<PriceSnapshot>> {
        self.receiver.recv().await
    }
}

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub lagged: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct Registry {
    senders: HashMap<SubscriberId, mpsc::Sender<Arc<PriceSnapshot>>>,
    closed: bool,
}

pub struct BroadcastHub {
    subscribers: Mutex<Registry>,
    next_id: AtomicU64,
    capacity: usize,
    metrics: Arc<MetricsCollector>,
}

impl BroadcastHub {
    /// `capacity` is the per-subscriber queue length (at least 1)
    pub fn new(capacity: usize, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            subscribers: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            metrics,
        }
    }

    /// Register a subscriber. After `close_all` the returned stream is
    /// already ended.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);

        let count = {
            let mut subscribers = self.subscribers.lock();
            if subscribers.closed {
                drop(subscribers);
                tracing::debug!(target: "broadcast", %id, "hub closed, subscription refused");
                return Subscription { id, receiver: rx };
            }
            subscribers.senders.insert(id, tx);
            subscribers.senders.len()
        };
        self.metrics.set_subscribers(count);
        tracing::debug!(target: "broadcast", %id, subscribers = count, "subscribed");

        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber; its stream ends once drained. Returns false if unknown.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.lock();
            let removed = subscribers.senders.remove(&id).is_some();
            (removed, subscribers.senders.len())
        };
        self.metrics.set_subscribers(count);
        if removed {
            tracing::debug!(target: "broadcast", %id, subscribers = count, "unsubscribed");
        }
        removed
    }

    /// Deliver `snapshot` to every current subscriber without waiting
    pub fn publish(&self, snapshot: PriceSnapshot) -> PublishReport {
        let snapshot = Arc::new(snapshot);
        let mut report = PublishReport::default();

        let count = {
            let mut subscribers = self.subscribers.lock();
            subscribers.senders.retain(|id, tx| match tx.try_send(snapshot.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    report.lagged += 1;
                    tracing::debug!(target: "broadcast", %id, "subscriber lagging, snapshot skipped");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    tracing::debug!(target: "broadcast", %id, "subscriber gone, removed");
                    false
                }
            });
            subscribers.senders.len()
        };

        self.metrics.record_snapshot_published();
        self.metrics.set_subscribers(count);
        if report.lagged > 0 {
            self.metrics.record_lagged(report.lagged as u64);
        }
        if report.dropped > 0 {
            self.metrics.record_subscribers_dropped(report.dropped as u64);
        }
        report
    }

    /// Drop every subscriber, ending their streams, and refuse new ones.
    /// Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let closed = {
            let mut subscribers = self.subscribers.lock();
            subscribers.closed = true;
            let closed = subscribers.senders.len();
            subscribers.senders.clear();
            closed
        };
        self.metrics.set_subscribers(0);
        tracing::info!(target: "broadcast", closed, "all subscribers closed");
        closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().senders.len()
    }

    pub fn is_closed(&self) -> bool {
        self.subscribers.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(capacity: usize) -> BroadcastHub {
        BroadcastHub::new(capacity, Arc::new(MetricsCollector::new()))
    }

    fn snapshot(price: f64) -> PriceSnapshot {
        [("Stephen Curry".to_string(), price)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = hub(4);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_ne!(a.id, b.id);

        let report = hub.publish(snapshot(101.0));
        assert_eq!(report.delivered, 2);

        assert_eq!(a.recv().await.unwrap().get("Stephen Curry"), Some(101.0));
        assert_eq!(b.recv().await.unwrap().get("Stephen Curry"), Some(101.0));
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_removed() {
        let hub = hub(4);
        let a = hub.subscribe();
        let _b = hub.subscribe();
        drop(a);

        let report = hub.publish(snapshot(1.0));
        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_full_subscriber_lags_but_stays() {
        let hub = hub(1);
        let mut slow = hub.subscribe();

        assert_eq!(hub.publish(snapshot(1.0)).delivered, 1);
        assert_eq!(hub.publish(snapshot(2.0)).lagged, 1);
        assert_eq!(hub.subscriber_count(), 1);

        // First snapshot kept, second skipped
        assert_eq!(slow.recv().await.unwrap().get("Stephen Curry"), Some(1.0));
        assert_eq!(hub.publish(snapshot(3.0)).delivered, 1);
        assert_eq!(slow.recv().await.unwrap().get("Stephen Curry"), Some(3.0));
    }

    #[tokio::test]
    async fn test_unsubscribe_and_close_all_end_streams() {
        let hub = hub(4);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        assert!(hub.unsubscribe(a.id));
        assert!(!hub.unsubscribe(a.id));
        assert!(a.recv().await.is_none());

        assert_eq!(hub.close_all(), 1);
        assert!(b.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_after_close_all_is_already_ended() {
        let hub = hub(4);
        hub.close_all();
        assert!(hub.is_closed());

        let mut late = hub.subscribe();
        assert!(late.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(snapshot(1.0)), PublishReport::default());
    }

    #[test]
    fn test_lag_counted_once_per_subscriber() {
        let metrics = Arc::new(MetricsCollector::new());
        let hub = BroadcastHub::new(1, metrics.clone());
        let _slow = [hub.subscribe(), hub.subscribe(), hub.subscribe()];

        hub.publish(snapshot(1.0));
        assert_eq!(hub.publish(snapshot(2.0)).lagged, 3);
        assert_eq!(metrics.snapshot().lagged_deliveries, 3);
    }
}
