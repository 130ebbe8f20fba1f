//! Ledger error types

use crate::core::{AccountId, InstrumentId};
use crate::oracle::OracleError;
use std::fmt;
use thiserror::Error;

/// Entity a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Account(AccountId),
    Instrument(InstrumentId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Account(id) => write!(f, "{}", id),
            Missing::Instrument(id) => write!(f, "{}", id),
        }
    }
}

/// Trade rejection. A rejected trade leaves the ledger untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradeError {
    #[error("shares must be a positive finite number, got {shares}")]
    InvalidQuantity { shares: f64 },

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: f64, held: f64 },

    #[error("ledger storage failed: {0}")]
    Storage(String),
}

/// Registration errors (roster seeding, account opening)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("{0} already registered")]
    DuplicateInstrument(InstrumentId),

    #[error("{0} already registered")]
    DuplicateAccount(AccountId),

    #[error("invalid price {price} for {id}")]
    InvalidPrice { id: InstrumentId, price: f64 },

    #[error("invalid balance {balance} for {id}")]
    InvalidBalance { id: AccountId, balance: f64 },
}

/// Failure to move one instrument's price during a tick
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceUpdateError {
    #[error("{0} not found")]
    UnknownInstrument(InstrumentId),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}
