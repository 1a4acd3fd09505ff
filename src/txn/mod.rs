//! Transactions: single-column-family batches of operations that are not
//! durable until commit and carry no isolation from concurrent writers.
//!
//! A transaction only ever touches one column family. Operations accumulate
//! in an ordered list; nothing reaches the memtable until [`Database::commit_txn`](crate::db::Database::commit_txn)
//! applies them one by one. Commit does **not** append to the write-ahead
//! log — a crash between commit and the next flush loses committed
//! transactional writes. This is a deliberate, documented trade-off, not an
//! oversight (see the project's design notes on transaction durability).
//!
//! Rollback undoes only the ops that were actually applied. A rolled-back
//! `put` is undone by deleting the key; a rolled-back `delete` cannot be
//! undone, because no prior value was captured when the delete was
//! recorded — rollback of a delete is a no-op by construction.


use thiserror::Error;

use crate::column_family::{ColumnFamily, ColumnFamilyError};
use crate::record::KeyValueRecord;

/// Errors raised while committing or rolling back a [`Transaction`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TxnError {
    #[error(transparent)]
    ColumnFamily(#[from] ColumnFamilyError),
    #[error("internal error: {0}")]
    Internal(String),
}

struct TxnEntry {
    /// The record to apply to the memtable on commit.
    record: KeyValueRecord,
    /// What to apply on rollback, if this entry has been committed.
    /// `None` for deletes, which carry no prior value to restore.
    rollback: Option<KeyValueRecord>,
    committed: bool,
}

/// An uncommitted batch of operations against one column family.
pub struct Transaction {
    column_family: String,
    entries: Vec<TxnEntry>,
}

impl Transaction {
    /// Begins a new transaction targeting `column_family`. Nothing is
    /// applied until [`Database::commit_txn`](crate::db::Database::commit_txn).
    pub fn begin(column_family: impl Into<String>) -> Self {
        Self {
            column_family: column_family.into(),
            entries: Vec::new(),
        }
    }

    /// Name of the column family this transaction targets.
    pub fn column_family(&self) -> &str {
        &self.column_family
    }

    /// Records a `put`. Its rollback-op is a delete of the same key — a
    /// rollback after this op has committed removes the key rather than
    /// restoring whatever value preceded it, matching the adopted design.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, ttl: i64) {
        let key = key.into();
        self.entries.push(TxnEntry {
            record: KeyValueRecord::live(key.clone(), value, ttl),
            rollback: Some(KeyValueRecord::tombstone(key)),
            committed: false,
        });
    }

    /// Records a `delete`. No rollback-op is stored: the prior value is not
    /// captured, so rolling back a committed delete is a no-op.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.entries.push(TxnEntry {
            record: KeyValueRecord::tombstone(key),
            rollback: None,
            committed: false,
        });
    }

    /// Number of ops recorded so far (committed or not).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn commit(&mut self, column_family: &ColumnFamily) -> Result<(), TxnError> {
        for entry in self.entries.iter_mut() {
            if entry.committed {
                continue;
            }
            column_family.apply(entry.record.clone())?;
            entry.committed = true;
        }
        Ok(())
    }

    pub(crate) fn rollback(&mut self, column_family: &ColumnFamily) -> Result<(), TxnError> {
        for entry in self.entries.iter_mut().rev() {
            if !entry.committed {
                continue;
            }
            if let Some(rollback) = entry.rollback.take() {
                column_family.apply(rollback)?;
            }
            entry.committed = false;
        }
        Ok(())
    }
}
