//! Core types shared by the ledger, engine and analytics
//!
//! - Ids: strongly typed account/instrument/transaction identifiers
//! - Instrument: live price plus bounded history
//! - Side, PriceSnapshot: trade direction and broadcast payload

pub mod ids;
pub mod instrument;
pub mod market_data;

pub use ids::{AccountId, InstrumentId, TransactionId};
pub use instrument::{is_valid_price, Instrument, PriceHistory, HISTORY_CAPACITY, MIN_PRICE};
pub use market_data::{PriceSnapshot, Side};
