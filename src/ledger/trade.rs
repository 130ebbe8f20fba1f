//! Trade application
//!
//! Buy/sell orders are validated and planned under the account lock then the
//! instrument lock. The instrument lock is released once the price is read;
//! the journal write and the commit happen under the account lock only.
//! Nothing is written before the journal accepts the transaction.

use super::error::{Missing, TradeError};
use super::records::{Position, Transaction, SHARE_EPSILON};
use super::store::LedgerStore;
use crate::core::{AccountId, InstrumentId, Side};
use crate::infrastructure::metrics::MetricsCollector;
use crate::log_ledger;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::Level;

/// Result of an accepted trade
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub transaction: Transaction,
    /// Account balance after the trade
    pub balance: f64,
    /// Position after the trade; `None` when a sell closed it
    pub position: Option<Position>,
}

/// Computed effect of a trade, not yet applied
struct TradePlan {
    balance: f64,
    position: Option<Position>,
    transaction: Transaction,
}

impl LedgerStore {
    /// Apply one buy or sell order atomically.
    ///
    /// Either every effect (balance, position, transaction) is committed or
    /// none is. The instrument price used is the one live while both locks
    /// are held, so a concurrent price tick lands strictly before or after.
    /// A sell within `SHARE_EPSILON` of the held quantity closes the position
    /// and records the quantity actually held.
    pub fn apply_trade(
        &self,
        account_id: AccountId,
        instrument_id: InstrumentId,
        side: Side,
        shares: f64,
    ) -> Result<TradeOutcome, TradeError> {
        if !(shares.is_finite() && shares > 0.0) {
            return Err(TradeError::InvalidQuantity { shares });
        }

        let book = self
            .account_handle(account_id)
            .ok_or(TradeError::NotFound(Missing::Account(account_id)))?;
        let instrument = self
            .instrument_handle(instrument_id)
            .ok_or(TradeError::NotFound(Missing::Instrument(instrument_id)))?;

        // Fixed order: account, then instrument
        let mut book = book.lock();
        let instrument = instrument.lock();

        let price = instrument.current_price();
        let now = OffsetDateTime::now_utc();
        let current = book.positions.get(&instrument_id);

        let (balance, position, filled) = match side {
            Side::Buy => {
                let total = shares * price;
                if total > book.account.balance {
                    return Err(TradeError::InsufficientFunds {
                        required: total,
                        available: book.account.balance,
                    });
                }

                let position = match current {
                    Some(p) => {
                        let new_shares = p.shares + shares;
                        Position {
                            shares: new_shares,
                            average_buy_price: (p.shares * p.average_buy_price + total) / new_shares,
                            last_updated: now,
                            ..p.clone()
                        }
                    }
                    None => Position {
                        account_id,
                        instrument_id,
                        shares,
                        average_buy_price: price,
                        last_updated: now,
                    },
                };
                (book.account.balance - total, Some(position), shares)
            }
            Side::Sell => {
                let held = current.map(|p| p.shares).unwrap_or(0.0);
                let position = match current {
                    Some(p) if shares <= p.shares + SHARE_EPSILON => p,
                    _ => {
                        return Err(TradeError::InsufficientShares {
                            requested: shares,
                            held,
                        })
                    }
                };

                let sold = shares.min(position.shares);
                let remaining = position.shares - sold;
                let position = (remaining > SHARE_EPSILON).then(|| Position {
                    shares: remaining,
                    last_updated: now,
                    ..position.clone()
                });
                (book.account.balance + sold * price, position, sold)
            }
        };
        // Price is fixed for this trade; ticks may proceed
        drop(instrument);

        let plan = TradePlan {
            balance,
            position,
            transaction: Transaction {
                id: self.allocate_tx_id(),
                account_id,
                instrument_id,
                side,
                shares: filled,
                price_per_share: price,
                total_amount: filled * price,
                timestamp: now,
            },
        };

        self.journal
            .append(&plan.transaction)
            .map_err(|e| TradeError::Storage(e.to_string()))?;

        // Commit
        book.account.balance = plan.balance;
        match &plan.position {
            Some(p) => {
                book.positions.insert(instrument_id, p.clone());
            }
            None => {
                book.positions.remove(&instrument_id);
            }
        }
        book.transactions.push(plan.transaction.clone());

        Ok(TradeOutcome {
            transaction: plan.transaction,
            balance: plan.balance,
            position: plan.position,
        })
    }
}

/// Trade submission front: ledger application plus logging and metrics
#[derive(Clone)]
pub struct TradeProcessor {
    ledger: Arc<LedgerStore>,
    metrics: Arc<MetricsCollector>,
}

impl TradeProcessor {
    pub fn new(ledger: Arc<LedgerStore>, metrics: Arc<MetricsCollector>) -> Self {
        Self { ledger, metrics }
    }

    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    /// Submit a trade. Synchronous: never awaits while holding ledger locks.
    pub fn submit_trade(
        &self,
        account_id: AccountId,
        instrument_id: InstrumentId,
        side: Side,
        shares: f64,
    ) -> Result<TradeOutcome, TradeError> {
        match self.ledger.apply_trade(account_id, instrument_id, side, shares) {
            Ok(outcome) => {
                self.metrics.record_trade_accepted();
                log_ledger!(
                    Level::INFO,
                    tx = outcome.transaction.id.as_raw(),
                    account = account_id.as_raw(),
                    instrument = instrument_id.as_raw(),
                    side = side.as_str(),
                    shares,
                    price = outcome.transaction.price_per_share,
                    balance = outcome.balance,
                    "trade executed"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.record_trade_rejected();
                match &e {
                    TradeError::Storage(reason) => tracing::error!(
                        target: "error",
                        account = account_id.as_raw(),
                        instrument = instrument_id.as_raw(),
                        "journal write failed: {}",
                        reason
                    ),
                    other => log_ledger!(
                        Level::DEBUG,
                        account = account_id.as_raw(),
                        instrument = instrument_id.as_raw(),
                        side = side.as_str(),
                        shares,
                        "trade rejected: {}",
                        other
                    ),
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Instrument;
    use crate::ledger::journal::Journal;
    use crate::ledger::records::Account;
    use std::io;
    use std::sync::Barrier;

    const ACCOUNT: AccountId = AccountId::from_raw(1);
    const PLAYER: InstrumentId = InstrumentId::from_raw(7);

    fn ledger_with(journal: Arc<dyn Journal>) -> LedgerStore {
        let ledger = LedgerStore::new(journal);
        ledger
            .add_instrument(Instrument::new(PLAYER, "Nikola Jokic", 100.0))
            .unwrap();
        ledger
            .add_account(Account::new(ACCOUNT, "demo", 10_000.0))
            .unwrap();
        ledger
    }

    fn ledger() -> LedgerStore {
        ledger_with(Arc::new(crate::ledger::NullJournal))
    }

    struct FailingJournal;

    impl Journal for FailingJournal {
        fn append(&self, _transaction: &Transaction) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    /// Blocks appends for one account until the test releases it
    struct GatedJournal {
        gated: AccountId,
        entered: Barrier,
        release: Barrier,
    }

    impl GatedJournal {
        fn new(gated: AccountId) -> Self {
            Self {
                gated,
                entered: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl Journal for GatedJournal {
        fn append(&self, transaction: &Transaction) -> io::Result<()> {
            if transaction.account_id == self.gated {
                self.entered.wait();
                self.release.wait();
            }
            Ok(())
        }
    }

    #[test]
    fn test_buy_creates_position() {
        let ledger = ledger();
        let outcome = ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 10.0).unwrap();

        assert_eq!(outcome.balance, 9_000.0);
        let position = outcome.position.unwrap();
        assert_eq!(position.shares, 10.0);
        assert_eq!(position.average_buy_price, 100.0);
        assert_eq!(outcome.transaction.total_amount, 1_000.0);
        assert_eq!(outcome.transaction.side, Side::Buy);
        assert_eq!(ledger.transactions(ACCOUNT).unwrap().len(), 1);
    }

    #[test]
    fn test_buy_averages_fills() {
        let ledger = ledger();
        ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 10.0).unwrap();
        ledger
            .reprice(PLAYER, OffsetDateTime::now_utc(), |_, _| Ok(200.0))
            .unwrap();
        let outcome = ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 10.0).unwrap();

        let position = outcome.position.unwrap();
        assert_eq!(position.shares, 20.0);
        assert!((position.average_buy_price - 150.0).abs() < 1e-9);
        assert_eq!(outcome.balance, 10_000.0 - 1_000.0 - 2_000.0);
    }

    #[test]
    fn test_sell_keeps_average_and_closes_position() {
        let ledger = ledger();
        ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 10.0).unwrap();
        ledger
            .reprice(PLAYER, OffsetDateTime::now_utc(), |_, _| Ok(110.0))
            .unwrap();

        let outcome = ledger.apply_trade(ACCOUNT, PLAYER, Side::Sell, 5.0).unwrap();
        assert!((outcome.balance - 9_550.0).abs() < 1e-9);
        assert_eq!(outcome.position.as_ref().unwrap().average_buy_price, 100.0);

        let outcome = ledger.apply_trade(ACCOUNT, PLAYER, Side::Sell, 5.0).unwrap();
        assert!((outcome.balance - 10_100.0).abs() < 1e-9);
        assert!(outcome.position.is_none());
        assert!(ledger.position(ACCOUNT, PLAYER).is_none());
        assert_eq!(ledger.transactions(ACCOUNT).unwrap().len(), 3);
    }

    #[test]
    fn test_sell_in_entered_lots_closes_position() {
        let ledger = ledger();
        ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 0.3).unwrap();
        ledger.apply_trade(ACCOUNT, PLAYER, Side::Sell, 0.1).unwrap();
        ledger.apply_trade(ACCOUNT, PLAYER, Side::Sell, 0.1).unwrap();

        // 0.3 - 0.1 - 0.1 leaves slightly under 0.1
        let held = ledger.position(ACCOUNT, PLAYER).unwrap().shares;
        assert!(held < 0.1);

        let outcome = ledger.apply_trade(ACCOUNT, PLAYER, Side::Sell, 0.1).unwrap();
        assert!(outcome.position.is_none());
        assert!(ledger.position(ACCOUNT, PLAYER).is_none());
        assert_eq!(outcome.transaction.shares, held);
        assert_eq!(outcome.transaction.total_amount, held * 100.0);
        assert!((outcome.balance - 10_000.0).abs() < 1e-9);

        let sold: f64 = ledger
            .transactions(ACCOUNT)
            .unwrap()
            .iter()
            .filter(|tx| tx.side == Side::Sell)
            .map(|tx| tx.shares)
            .sum();
        assert!((sold - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_sell_beyond_epsilon_is_rejected() {
        let ledger = ledger();
        ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 1.0).unwrap();
        assert!(matches!(
            ledger.apply_trade(ACCOUNT, PLAYER, Side::Sell, 1.0 + 1e-6),
            Err(TradeError::InsufficientShares { .. })
        ));
        assert_eq!(ledger.position(ACCOUNT, PLAYER).unwrap().shares, 1.0);
    }

    #[test]
    fn test_rejections_leave_state_untouched() {
        let ledger = ledger();

        assert_eq!(
            ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 0.0),
            Err(TradeError::InvalidQuantity { shares: 0.0 })
        );
        assert!(matches!(
            ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, f64::NAN),
            Err(TradeError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 101.0),
            Err(TradeError::InsufficientFunds { .. })
        ));
        assert_eq!(
            ledger.apply_trade(ACCOUNT, PLAYER, Side::Sell, 1.0),
            Err(TradeError::InsufficientShares {
                requested: 1.0,
                held: 0.0
            })
        );
        assert_eq!(
            ledger.apply_trade(AccountId::from_raw(9), PLAYER, Side::Buy, 1.0),
            Err(TradeError::NotFound(Missing::Account(AccountId::from_raw(9))))
        );
        assert_eq!(
            ledger.apply_trade(ACCOUNT, InstrumentId::from_raw(9), Side::Buy, 1.0),
            Err(TradeError::NotFound(Missing::Instrument(InstrumentId::from_raw(9))))
        );

        assert_eq!(ledger.account(ACCOUNT).unwrap().balance, 10_000.0);
        assert!(ledger.positions(ACCOUNT).unwrap().is_empty());
        assert!(ledger.all_transactions().is_empty());
    }

    #[test]
    fn test_journal_failure_aborts_trade() {
        let ledger = ledger_with(Arc::new(FailingJournal));
        let err = ledger
            .apply_trade(ACCOUNT, PLAYER, Side::Buy, 1.0)
            .unwrap_err();
        assert!(matches!(err, TradeError::Storage(_)));

        assert_eq!(ledger.account(ACCOUNT).unwrap().balance, 10_000.0);
        assert!(ledger.position(ACCOUNT, PLAYER).is_none());
        assert!(ledger.transactions(ACCOUNT).unwrap().is_empty());
    }

    #[test]
    fn test_blocked_journal_write_does_not_stall_other_accounts() {
        const OTHER: AccountId = AccountId::from_raw(2);
        const OTHER_PLAYER: InstrumentId = InstrumentId::from_raw(8);

        let journal = Arc::new(GatedJournal::new(ACCOUNT));
        let ledger = Arc::new(ledger_with(journal.clone()));
        ledger
            .add_instrument(Instrument::new(OTHER_PLAYER, "Luka Doncic", 50.0))
            .unwrap();
        ledger
            .add_account(Account::new(OTHER, "other", 1_000.0))
            .unwrap();

        let blocked = {
            let ledger = ledger.clone();
            std::thread::spawn(move || ledger.apply_trade(ACCOUNT, PLAYER, Side::Buy, 1.0))
        };
        journal.entered.wait();

        // Account 1 is parked inside its journal write
        ledger.apply_trade(OTHER, OTHER_PLAYER, Side::Buy, 2.0).unwrap();
        ledger.apply_trade(OTHER, PLAYER, Side::Buy, 1.0).unwrap();
        ledger
            .reprice(PLAYER, OffsetDateTime::now_utc(), |_, _| Ok(120.0))
            .unwrap();
        assert_eq!(ledger.account(OTHER).unwrap().balance, 1_000.0 - 100.0 - 100.0);

        journal.release.wait();
        let outcome = blocked.join().unwrap().unwrap();
        assert_eq!(outcome.transaction.price_per_share, 100.0);
        assert_eq!(ledger.account(ACCOUNT).unwrap().balance, 9_900.0);
        assert_eq!(ledger.instrument(PLAYER).unwrap().current_price(), 120.0);
    }

    #[test]
    fn test_processor_counts_outcomes() {
        let metrics = Arc::new(MetricsCollector::new());
        let processor = TradeProcessor::new(Arc::new(ledger()), metrics.clone());

        processor.submit_trade(ACCOUNT, PLAYER, Side::Buy, 1.0).unwrap();
        processor
            .submit_trade(ACCOUNT, PLAYER, Side::Sell, 5.0)
            .unwrap_err();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.trades_accepted, 1);
        assert_eq!(snapshot.trades_rejected, 1);
    }
}
