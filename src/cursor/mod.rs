//! Cursors: ordered traversal of one column family's memtable followed by
//! its SSTables, newest to oldest.
//!
//! A cursor does **not** merge-sort across levels. A forward traversal
//! visits every memtable record in key order, then every record of the
//! newest SSTable in key order, then the next-older SSTable, and so on.
//! The same key may surface more than once across levels; callers that
//! want a deduplicated view are expected to track keys themselves. This is
//! a deliberate, documented limitation, not an oversight.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use thiserror::Error;

use crate::column_family::{ColumnFamily, ColumnFamilyError};
use crate::record::KeyValueRecord;
use crate::sstable::{SSTable, SSTableError};

/// Errors raised while positioning or reading a [`Cursor`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CursorError {
    /// `prev()` called while already positioned before the first record.
    #[error("cursor is before the first record")]
    AtStart,
    /// `next()` called while already positioned past the last record.
    #[error("cursor is past the last record")]
    AtEnd,
    /// `get()` called on a position that holds no current record.
    #[error("cursor is not positioned on a record")]
    NotPositioned,
    /// The current record is a tombstone or has expired; not a fatal error,
    /// but the caller must decide whether to skip it.
    #[error("current record is a tombstone or has expired")]
    Dead,
    #[error(transparent)]
    ColumnFamily(#[from] ColumnFamilyError),
    #[error(transparent)]
    Sstable(#[from] SSTableError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// Before the very first record.
    BeforeStart,
    Memtable,
    /// Currently positioned inside `sstables[index]`.
    Sstable(usize),
    /// Past the last record.
    AfterEnd,
}

/// Ordered traversal cursor over one column family: memtable first, then
/// SSTables newest to oldest.
pub struct Cursor {
    now_secs: i64,
    memtable: Vec<KeyValueRecord>,
    /// Snapshot of SSTables, newest first, taken at [`Cursor::init`].
    sstables: Vec<Arc<SSTable>>,
    level: Level,
    memtable_pos: usize,
    /// Records of the SSTable currently positioned on, loaded lazily when
    /// the cursor first enters that level.
    sstable_records: Vec<KeyValueRecord>,
    sstable_pos: usize,
}

impl Cursor {
    /// Opens a cursor over `column_family`, positioned before the first
    /// record. `now_secs` is used for TTL-expiry checks in [`Cursor::get`].
    pub fn init(column_family: Arc<ColumnFamily>, now_secs: i64) -> Result<Self, CursorError> {
        let memtable = column_family.memtable_snapshot()?;
        let mut sstables = column_family.list_sstables()?;
        sstables.reverse(); // oldest-first -> newest-first

        Ok(Self {
            now_secs,
            memtable,
            sstables,
            level: Level::BeforeStart,
            memtable_pos: 0,
            sstable_records: Vec::new(),
            sstable_pos: 0,
        })
    }

    /// Advances to the next record. Returns `Ok(())` if a record is now
    /// current, or `Err(CursorError::AtEnd)` if traversal is exhausted.
    pub fn next(&mut self) -> Result<(), CursorError> {
        match self.level {
            Level::BeforeStart => {
                self.memtable_pos = 0;
                self.level = Level::Memtable;
                self.enter_first_sstable_if_memtable_exhausted();
            }
            Level::Memtable => {
                self.memtable_pos += 1;
                self.enter_first_sstable_if_memtable_exhausted();
            }
            Level::Sstable(index) => {
                self.sstable_pos += 1;
                if self.sstable_pos >= self.sstable_records.len() {
                    self.enter_sstable(index + 1)?;
                }
            }
            Level::AfterEnd => return Err(CursorError::AtEnd),
        }
        if matches!(self.level, Level::AfterEnd) {
            return Err(CursorError::AtEnd);
        }
        Ok(())
    }

    /// Retreats to the previous record. Symmetric to [`Cursor::next`].
    pub fn prev(&mut self) -> Result<(), CursorError> {
        match self.level {
            Level::AfterEnd => {
                self.retreat_through_sstables(self.sstables.len())?;
            }
            Level::Sstable(index) => {
                if self.sstable_pos == 0 {
                    self.retreat_through_sstables(index)?;
                } else {
                    self.sstable_pos -= 1;
                }
            }
            Level::Memtable => {
                if self.memtable_pos == 0 {
                    self.level = Level::BeforeStart;
                    return Err(CursorError::AtStart);
                }
                self.memtable_pos -= 1;
            }
            Level::BeforeStart => return Err(CursorError::AtStart),
        }
        Ok(())
    }

    /// Returns a clone of the record currently under the cursor.
    ///
    /// Returns [`CursorError::Dead`] (non-fatal) if that record is a
    /// tombstone or has expired — the caller decides whether to skip it
    /// and keep traversing.
    pub fn get(&self) -> Result<KeyValueRecord, CursorError> {
        let record = match self.level {
            Level::Memtable => self
                .memtable
                .get(self.memtable_pos)
                .ok_or(CursorError::NotPositioned)?,
            Level::Sstable(_) => self
                .sstable_records
                .get(self.sstable_pos)
                .ok_or(CursorError::NotPositioned)?,
            Level::BeforeStart | Level::AfterEnd => return Err(CursorError::NotPositioned),
        };

        if !record.is_visible(self.now_secs) {
            return Err(CursorError::Dead);
        }
        Ok(record.clone())
    }

    fn enter_first_sstable_if_memtable_exhausted(&mut self) {
        if self.memtable_pos < self.memtable.len() {
            return;
        }
        if self.sstables.is_empty() {
            self.level = Level::AfterEnd;
            return;
        }
        // enter_sstable(0) cannot fail: index 0 < sstables.len() was just checked.
        self.enter_sstable(0).expect("sstable index in bounds");
    }

    fn enter_sstable(&mut self, index: usize) -> Result<(), CursorError> {
        if index >= self.sstables.len() {
            self.level = Level::AfterEnd;
            return Ok(());
        }
        let mut records = Vec::new();
        for record in self.sstables[index].iter_records() {
            records.push(record?);
        }
        self.sstable_records = records;
        self.sstable_pos = 0;
        self.level = Level::Sstable(index);
        if self.sstable_records.is_empty() {
            return self.enter_sstable(index + 1);
        }
        Ok(())
    }

    fn retreat_through_sstables(&mut self, from_index: usize) -> Result<(), CursorError> {
        if from_index == 0 {
            self.enter_last_memtable_position();
            return Ok(());
        }
        let mut index = from_index;
        loop {
            index -= 1;
            let mut records = Vec::new();
            for record in self.sstables[index].iter_records() {
                records.push(record?);
            }
            if !records.is_empty() {
                self.sstable_pos = records.len() - 1;
                self.sstable_records = records;
                self.level = Level::Sstable(index);
                return Ok(());
            }
            if index == 0 {
                self.enter_last_memtable_position();
                return Ok(());
            }
        }
    }

    fn enter_last_memtable_position(&mut self) {
        if self.memtable.is_empty() {
            self.level = Level::BeforeStart;
            return;
        }
        self.memtable_pos = self.memtable.len() - 1;
        self.level = Level::Memtable;
    }
}
