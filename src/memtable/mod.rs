//! # Memtable Module
//!
//! ## Design Invariants
//!
//! - The memtable holds exactly one [`KeyValueRecord`] per key — a `put`
//!   overwrites whatever was there, a `delete` overwrites it with a
//!   tombstone. There is no multi-version history and no LSN: the memtable
//!   is a plain ordered map from key to "the latest thing written".
//! - Durability is not the memtable's concern. The caller (the column
//!   family / database layer) is responsible for appending the
//!   corresponding [`crate::record::Operation`] to the shared write-ahead
//!   log *before* calling into the memtable — the memtable itself owns no
//!   WAL.
//! - `approximate_size` tracks key+value bytes only, for the column
//!   family's flush-threshold check; the check happens *after* a write is
//!   applied, not before (an oversized single write is still accepted).
//!
//! ## Flush Semantics
//!
//! - `iter` returns every record currently held, in key order, including
//!   tombstones — the SSTable writer decides what survives.
//! - Iteration does not mutate or clear in-memory state; the memtable
//!   becomes eligible for removal only once its column family atomically
//!   swaps it out for the new SSTable.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    collections::BTreeMap,
    sync::RwLock,
    sync::atomic::{AtomicUsize, Ordering},
};

use thiserror::Error;
use tracing::{error, trace};

use crate::record::KeyValueRecord;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Represents possible errors returned by [`Memtable`] operations.
#[derive(Debug, Error)]
pub enum MemtableError {
    /// The supplied key was empty.
    #[error("key must not be empty")]
    EmptyKey,

    /// Internal invariant violation or poisoned lock.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Memtable Core
// ------------------------------------------------------------------------------------------------

/// The mutable, in-memory write buffer of a column family.
///
/// The memtable stores the single latest [`KeyValueRecord`] per key.
/// Callers are expected to have already appended the mutation to the
/// database's write-ahead log; the memtable here only maintains the
/// queryable in-memory view and a running size estimate.
///
/// # Concurrency
/// - Writers acquire an exclusive lock over the underlying tree.
/// - Readers (`get`, `scan`, `iter`) acquire a shared lock.
pub struct Memtable {
    tree: RwLock<BTreeMap<Vec<u8>, KeyValueRecord>>,
    approximate_size: AtomicUsize,
}

impl Memtable {
    /// Creates a new, empty memtable.
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(BTreeMap::new()),
            approximate_size: AtomicUsize::new(0),
        }
    }

    /// Rebuilds a memtable from an already-decoded set of records, as done
    /// when replaying the database's write-ahead log on open.
    pub fn from_records<I: IntoIterator<Item = KeyValueRecord>>(records: I) -> Self {
        let memtable = Self::new();
        for record in records {
            memtable.apply(record).expect("fresh lock cannot be poisoned");
        }
        memtable
    }

    /// Applies a record, overwriting any prior value for its key.
    ///
    /// This is the single mutation path used by both `put` and `delete`.
    pub fn apply(&self, record: KeyValueRecord) -> Result<(), MemtableError> {
        if record.key.is_empty() {
            return Err(MemtableError::EmptyKey);
        }

        trace!(key = %HexKey(&record.key), "memtable apply");

        let new_size = record.byte_len();
        let mut guard = self.tree.write().map_err(|_| {
            error!("memtable lock poisoned during apply");
            MemtableError::Internal("lock poisoned".into())
        })?;

        let old_size = guard.get(&record.key).map(KeyValueRecord::byte_len).unwrap_or(0);
        guard.insert(record.key.clone(), record);

        self.approximate_size
            .fetch_add(new_size, Ordering::Relaxed);
        if old_size > 0 {
            self.approximate_size
                .fetch_sub(old_size, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Inserts or updates `key` with `value`, expiring at `ttl` (`<= 0` for
    /// no expiry).
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>, ttl: i64) -> Result<(), MemtableError> {
        self.apply(KeyValueRecord::live(key, value, ttl))
    }

    /// Marks `key` as deleted with a tombstone.
    pub fn delete(&self, key: Vec<u8>) -> Result<(), MemtableError> {
        self.apply(KeyValueRecord::tombstone(key))
    }

    /// Returns the record currently held for `key`, if any.
    ///
    /// The caller must check `record.value.is_tombstone()` and TTL
    /// expiry — the memtable returns the raw record, not a resolved
    /// visibility decision.
    pub fn get(&self, key: &[u8]) -> Result<Option<KeyValueRecord>, MemtableError> {
        let guard = self.tree.read().map_err(|_| {
            error!("memtable lock poisoned during get");
            MemtableError::Internal("lock poisoned".into())
        })?;
        Ok(guard.get(key).cloned())
    }

    /// Returns every record in `[start, end)`, in ascending key order,
    /// including tombstones.
    pub fn scan(
        &self,
        start: &[u8],
        end: &[u8],
    ) -> Result<Vec<KeyValueRecord>, MemtableError> {
        if start >= end {
            return Ok(Vec::new());
        }

        let guard = self.tree.read().map_err(|_| {
            error!("memtable lock poisoned during scan");
            MemtableError::Internal("lock poisoned".into())
        })?;

        Ok(guard
            .range(start.to_vec()..end.to_vec())
            .map(|(_, record)| record.clone())
            .collect())
    }

    /// Returns every record held, in ascending key order.
    ///
    /// Used by the flush pipeline to materialize a new SSTable.
    pub fn iter(&self) -> Result<Vec<KeyValueRecord>, MemtableError> {
        let guard = self.tree.read().map_err(|_| {
            error!("memtable lock poisoned during iter");
            MemtableError::Internal("lock poisoned".into())
        })?;
        Ok(guard.values().cloned().collect())
    }

    /// Number of distinct keys currently held.
    pub fn len(&self) -> Result<usize, MemtableError> {
        let guard = self.tree.read().map_err(|_| {
            error!("memtable lock poisoned during len");
            MemtableError::Internal("lock poisoned".into())
        })?;
        Ok(guard.len())
    }

    /// `true` when no records are held.
    pub fn is_empty(&self) -> Result<bool, MemtableError> {
        Ok(self.len()? == 0)
    }

    /// Approximate key+value byte footprint of all records currently held.
    ///
    /// Used by the column family to decide when a flush is due; the check
    /// happens after a write lands, so a single oversized write is still
    /// accepted and simply makes the next check trip sooner.
    pub fn approximate_size(&self) -> usize {
        self.approximate_size.load(Ordering::Relaxed)
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------------------------------------
// Tracing Helper
// ------------------------------------------------------------------------------------------------

pub(crate) struct HexKey<'a>(pub &'a [u8]);

impl<'a> std::fmt::Display for HexKey<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.len() <= 32 {
            for byte in self.0 {
                write!(f, "{:02x}", byte)?;
            }
        } else {
            for byte in &self.0[..16] {
                write!(f, "{:02x}", byte)?;
            }
            write!(f, "...[{} bytes]", self.0.len())?;
        }
        Ok(())
    }
}
