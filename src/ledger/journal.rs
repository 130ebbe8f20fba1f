//! Append-only transaction journal
//!
//! Every executed trade is written here under its account lock, before the
//! in-memory ledger is touched. A failed write aborts the trade.
//!
//! Format: one JSON object per line, one file per account
//! (`<dir>/account-<id>.jsonl`), so trades on different accounts never
//! share a file handle.

use super::records::Transaction;
use crate::core::AccountId;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

/// Durable sink for transaction records.
///
/// Callers hold the transaction's account lock, so appends for one account
/// are already serialized. Implementations must not serialize across accounts.
pub trait Journal: Send + Sync {
    fn append(&self, transaction: &Transaction) -> io::Result<()>;
}

/// Discards records. Used when no journal path is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJournal;

impl Journal for NullJournal {
    #[inline]
    fn append(&self, _transaction: &Transaction) -> io::Result<()> {
        Ok(())
    }
}

/// Serialized journal line
#[derive(Debug, Serialize)]
struct JournalRecord<'a> {
    id: u64,
    account_id: u32,
    instrument_id: u32,
    side: &'a str,
    shares: f64,
    price_per_share: f64,
    total_amount: f64,
    timestamp: String,
}

impl<'a> JournalRecord<'a> {
    fn from_transaction(tx: &'a Transaction) -> io::Result<Self> {
        let timestamp = tx
            .timestamp
            .format(&Rfc3339)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self {
            id: tx.id.as_raw(),
            account_id: tx.account_id.as_raw(),
            instrument_id: tx.instrument_id.as_raw(),
            side: tx.side.as_str(),
            shares: tx.shares,
            price_per_share: tx.price_per_share,
            total_amount: tx.total_amount,
            timestamp,
        })
    }
}

/// JSON-lines journal sharded per account, flushed on every append
pub struct JsonlJournal {
    dir: PathBuf,
    shards: RwLock<HashMap<AccountId, Arc<File>>>,
}

impl JsonlJournal {
    /// Open (or create) the journal directory. Shard files open lazily.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            shards: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding one account's records
    pub fn shard_path(&self, account: AccountId) -> PathBuf {
        self.dir.join(format!("account-{}.jsonl", account.as_raw()))
    }

    fn shard(&self, account: AccountId) -> io::Result<Arc<File>> {
        if let Some(file) = self.shards.read().get(&account) {
            return Ok(file.clone());
        }

        // Open outside the map lock
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.shard_path(account))?;
        let mut shards = self.shards.write();
        Ok(shards.entry(account).or_insert_with(|| Arc::new(file)).clone())
    }
}

impl Journal for JsonlJournal {
    fn append(&self, transaction: &Transaction) -> io::Result<()> {
        let record = JournalRecord::from_transaction(transaction)?;
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let shard = self.shard(transaction.account_id)?;
        let mut file: &File = &shard;
        file.write_all(&line)?;
        file.flush()
    }
}
