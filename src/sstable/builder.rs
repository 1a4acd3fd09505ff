//! SSTable writer — builds a complete SSTable file from a sorted sequence
//! of records.
//!
//! # Output guarantees
//!
//! - Every record passed in is written verbatim. Deciding which records
//!   to pass is entirely the caller's job: both the flush path and
//!   compaction's pair-merge filter out tombstones and expired records
//!   before calling this builder, so only live, non-expired entries ever
//!   reach it in practice.
//! - If `records` is empty, no file is written at all — the caller
//!   treats this as "nothing to materialize".
//! - The bloom filter is built and written in a first pass, before any
//!   record block, so the read path can consult it without parsing a
//!   single record.
//! - The file is written atomically via a `.tmp` → final rename.
//!
//! # Atomicity
//!
//! 1. Write everything to `path.tmp`.
//! 2. Flush and sync the file.
//! 3. Rename `path.tmp` → `path`.
//!
//! A crash cannot produce a partially-written SSTable visible under its
//! final name.

use std::{
    fs::{File, rename},
    io::Write,
    path::{Path, PathBuf},
};

use bloomfilter::Bloom;
use tracing::debug;

use crate::encoding;
use crate::record::KeyValueRecord;

use super::{SSTableError, encode_header, write_block};

/// Builds SSTable files from an already-sorted stream of records.
pub struct SstableBuilder;

impl SstableBuilder {
    /// Writes `records` (must already be sorted ascending by key) to a new
    /// SSTable at `path`, using `probability` as the bloom filter's target
    /// false-positive rate.
    ///
    /// Returns `Ok(None)` and writes nothing if `records` is empty.
    pub fn build(
        path: impl AsRef<Path>,
        records: &[KeyValueRecord],
        probability: f64,
    ) -> Result<Option<PathBuf>, SSTableError> {
        if records.is_empty() {
            debug!("sstable build received no records, skipping file");
            return Ok(None);
        }

        let mut bloom = Bloom::new_for_fp_rate(records.len(), probability)
            .map_err(|e| SSTableError::Internal(format!("bloom filter sizing: {e:?}")))?;
        for record in records {
            bloom.set(&record.key);
        }

        let mut buf = Vec::new();
        encode_header(&mut buf).map_err(SSTableError::Encoding)?;
        write_block(&mut buf, bloom.as_slice());

        for record in records {
            let encoded = encoding::encode_to_vec(record).map_err(SSTableError::Encoding)?;
            write_block(&mut buf, &encoded);
        }

        let path = path.as_ref();
        let tmp_path = path.with_extension("sst.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        rename(&tmp_path, path)?;

        debug!(records = records.len(), path = %path.display(), "sstable written");
        Ok(Some(path.to_path_buf()))
    }
}
