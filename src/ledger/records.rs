//! Ledger records: accounts, positions, transactions and portfolio views

use crate::core::{AccountId, InstrumentId, Side, TransactionId};
use time::OffsetDateTime;

/// Shares at or below this residue count as a closed position
pub const SHARE_EPSILON: f64 = 1e-9;

/// Trading account. `balance` never goes negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub balance: f64,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, balance: f64) -> Self {
        Self {
            id,
            name: name.into(),
            balance,
        }
    }
}

/// Holding of one instrument by one account. Exists only while `shares > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub shares: f64,
    /// Shares-weighted average of buy fills; sells leave it unchanged
    pub average_buy_price: f64,
    pub last_updated: OffsetDateTime,
}

/// Immutable record of one executed trade
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub shares: f64,
    /// Instrument price at execution
    pub price_per_share: f64,
    /// `shares * price_per_share`
    pub total_amount: f64,
    pub timestamp: OffsetDateTime,
}

/// Position valued at the instrument's live price
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub position: Position,
    pub instrument_name: String,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

impl Holding {
    pub fn value(position: Position, instrument_name: String, current_price: f64) -> Self {
        let market_value = position.shares * current_price;
        let unrealized_pnl = (current_price - position.average_buy_price) * position.shares;
        Self {
            position,
            instrument_name,
            current_price,
            market_value,
            unrealized_pnl,
        }
    }
}

/// Account balance together with all valued holdings
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub account: Account,
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    /// Cash plus market value of all holdings
    pub fn equity(&self) -> f64 {
        self.account.balance + self.holdings.iter().map(|h| h.market_value).sum::<f64>()
    }
}
