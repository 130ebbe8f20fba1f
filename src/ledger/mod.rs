//! Trading ledger
//!
//! - store: accounts, positions, instruments and transactions with per-key locks
//! - trade: atomic buy/sell application and the submission front
//! - journal: durable append-only transaction mirror
//! - seed: roster registration at startup

pub mod error;
pub mod journal;
pub mod records;
pub mod seed;
pub mod store;
pub mod trade;

pub use error::{LedgerError, Missing, PriceUpdateError, TradeError};
pub use journal::{Journal, JsonlJournal, NullJournal};
pub use records::{Account, Holding, Portfolio, Position, Transaction, SHARE_EPSILON};
pub use seed::{demo_instruments, seed_ledger, SeedReport};
pub use store::{LedgerStore, PriceChange};
pub use trade::{TradeOutcome, TradeProcessor};
