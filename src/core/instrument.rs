//! Instrument state: live price plus bounded price history
//!
//! The history holds only prices that were previously live, oldest first.
//! It never contains the not-yet-applied next price.

use super::InstrumentId;
use crate::infrastructure::RingBuffer;
use time::OffsetDateTime;

/// Number of prior prices retained per instrument
pub const HISTORY_CAPACITY: usize = 30;

/// Bounded FIFO of prior prices
pub type PriceHistory = RingBuffer<f64, HISTORY_CAPACITY>;

/// Lowest price an instrument may ever be assigned
pub const MIN_PRICE: f64 = 0.01;

/// A price is usable when it is finite and strictly positive
#[inline(always)]
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Tradable athlete stock
#[derive(Debug, Clone)]
pub struct Instrument {
    pub id: InstrumentId,
    /// Display name (athlete full name), also the key in price snapshots
    pub name: String,
    pub team: String,
    pub position: String,
    current_price: f64,
    history: PriceHistory,
    last_updated: OffsetDateTime,
}

impl Instrument {
    /// Create instrument with an empty history.
    ///
    /// Caller validates `price` with [`is_valid_price`].
    pub fn new(id: InstrumentId, name: impl Into<String>, price: f64) -> Self {
        Self {
            id,
            name: name.into(),
            team: String::new(),
            position: String::new(),
            current_price: price,
            history: PriceHistory::new(),
            last_updated: OffsetDateTime::now_utc(),
        }
    }

    /// Attach roster details
    pub fn with_details(mut self, team: impl Into<String>, position: impl Into<String>) -> Self {
        self.team = team.into();
        self.position = position.into();
        self
    }

    /// Seed prior prices (oldest first). Invalid values are skipped.
    pub fn with_history(mut self, prices: impl IntoIterator<Item = f64>) -> Self {
        self.history
            .extend(prices.into_iter().filter(|p| is_valid_price(*p)));
        self
    }

    #[inline(always)]
    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    #[inline(always)]
    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    #[inline(always)]
    pub fn last_updated(&self) -> OffsetDateTime {
        self.last_updated
    }

    /// Move to `next_price`: the current price is archived into history
    /// (evicting the oldest beyond capacity) and `next_price` becomes live.
    ///
    /// Returns the previous price.
    pub fn apply_price(&mut self, next_price: f64, at: OffsetDateTime) -> f64 {
        debug_assert!(is_valid_price(next_price));
        let previous = self.current_price;
        self.history.push(previous);
        self.current_price = next_price;
        self.last_updated = at;
        previous
    }
}
