//! Pairwise SSTable compaction.
//!
//! Compaction reclaims space and shortens read paths by merging
//! neighbouring SSTables two at a time. The caller picks `max_threads`;
//! the column family's SSTable list (already kept oldest-first) is split
//! into that many contiguous ranges, and each range is compacted by its
//! own worker using [`crossbeam::thread::scope`] — pairs `(i, i+1)` at
//! stride 2 within the worker's own slice, so no two workers ever touch
//! the same SSTable.
//!
//! A pair-merge that fails leaves both inputs untouched and is simply
//! skipped; it never poisons the rest of the round.


use std::{collections::BTreeMap, ops::Range, sync::Arc, thread};

use thiserror::Error;
use tracing::{debug, warn};

use crate::column_family::{ColumnFamily, ColumnFamilyError};
use crate::record::{self, KeyValueRecord};
use crate::sstable::{SSTable, SSTableError, SstableBuilder};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompactionError {
    #[error("not enough SSTables")]
    NotEnoughSstables,

    #[error(transparent)]
    ColumnFamily(#[from] ColumnFamilyError),

    #[error(transparent)]
    Sstable(#[from] SSTableError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Summary of one compaction round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    pub sstables_before: usize,
    pub sstables_after: usize,
}

/// Runs one round of pairwise compaction over `cf`'s current SSTable list.
///
/// Requires at least two SSTables. Spawns up to `max_threads` workers,
/// each owning a disjoint contiguous range of the (already oldest-first)
/// list.
pub fn compact(
    cf: &ColumnFamily,
    max_threads: usize,
    now_secs: i64,
) -> Result<CompactionReport, CompactionError> {
    let sstables = cf.list_sstables()?;
    let before = sstables.len();
    if before < 2 {
        return Err(CompactionError::NotEnoughSstables);
    }

    let threads = max_threads.max(1).min(before);
    let ranges = partition_ranges(before, threads);

    let per_range_results: thread::Result<Vec<Vec<Option<Arc<SSTable>>>>> =
        crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = ranges
                .into_iter()
                .map(|range| {
                    let sstables = &sstables;
                    scope.spawn(move |_| compact_range(cf, sstables, range, now_secs))
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        })
        .map_err(|_| CompactionError::Internal("compaction worker thread panicked".into()))?;

    let merged: Vec<Arc<SSTable>> = per_range_results
        .map_err(|_| CompactionError::Internal("compaction worker thread panicked".into()))?
        .into_iter()
        .flatten()
        .flatten()
        .collect();

    let after = merged.len();
    cf.replace_sstables(merged)?;
    debug!(cf = %cf.name(), before, after, "compaction round completed");
    Ok(CompactionReport {
        sstables_before: before,
        sstables_after: after,
    })
}

/// Splits `len` items into `threads` contiguous, roughly-even ranges.
fn partition_ranges(len: usize, threads: usize) -> Vec<Range<usize>> {
    let mut ranges = Vec::with_capacity(threads);
    let base = len / threads;
    let remainder = len % threads;
    let mut start = 0;
    for i in 0..threads {
        let size = base + if i < remainder { 1 } else { 0 };
        if size == 0 {
            continue;
        }
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Compacts one contiguous range of `sstables` in place, pairing
/// `(i, i+1)` at stride 2.
fn compact_range(
    cf: &ColumnFamily,
    sstables: &[Arc<SSTable>],
    range: Range<usize>,
    now_secs: i64,
) -> Vec<Option<Arc<SSTable>>> {
    let mut slots: Vec<Option<Arc<SSTable>>> = sstables[range].iter().cloned().map(Some).collect();

    let mut i = 0;
    while i + 1 < slots.len() {
        if let (Some(a), Some(b)) = (slots[i].clone(), slots[i + 1].clone()) {
            match pair_merge(cf, &a, &b, now_secs) {
                Ok(merged) => {
                    if let Err(e) = std::fs::remove_file(a.path()) {
                        warn!(path = %a.path().display(), error = %e, "failed to remove old sstable after merge");
                    }
                    if let Err(e) = std::fs::remove_file(b.path()) {
                        warn!(path = %b.path().display(), error = %e, "failed to remove old sstable after merge");
                    }
                    slots[i] = merged.map(Arc::new);
                    slots[i + 1] = None;
                }
                Err(e) => {
                    warn!(a = a.id(), b = b.id(), error = %e, "pair-merge failed, leaving both sstables intact");
                }
            }
        }
        i += 2;
    }

    slots
}

/// Merges two SSTables into a new one. `b` MUST be the newer of the
/// pair: on equal keys its entry wins, since it is inserted into the
/// ephemeral merge index last. Tombstones and expired entries from
/// either input are dropped rather than carried forward.
///
/// Returns `Ok(None)` when the merge produces no live records — the
/// caller drops both inputs without writing a replacement file.
fn pair_merge(
    cf: &ColumnFamily,
    a: &SSTable,
    b: &SSTable,
    now_secs: i64,
) -> Result<Option<SSTable>, CompactionError> {
    let mut index: BTreeMap<Vec<u8>, KeyValueRecord> = BTreeMap::new();
    for record in a.iter_records().chain(b.iter_records()) {
        let record = record?;
        if record.value.is_tombstone() || record::is_expired(record.ttl, now_secs) {
            continue;
        }
        index.insert(record.key.clone(), record);
    }

    if index.is_empty() {
        return Ok(None);
    }

    let records: Vec<KeyValueRecord> = index.into_values().collect();
    let id = cf.next_sstable_id();
    let path = cf.sstable_path(id);
    let written = SstableBuilder::build(&path, &records, cf.config.probability)?;
    match written {
        Some(_) => Ok(Some(SSTable::open(&path, id)?)),
        None => Ok(None),
    }
}
