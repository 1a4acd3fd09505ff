//! Sorted String Table (SSTable) module.
//!
//! An SSTable is an immutable, disk-backed, sorted file produced by a
//! memtable flush or by compaction. Unlike a block-indexed format, this
//! module deliberately keeps the on-disk layout linear: a bloom filter
//! block up front, followed by one record per page in ascending key
//! order, and nothing else. There is no block index, no footer, and no
//! metaindex — the bloom filter is the only structure consulted before a
//! full linear scan.
//!
//! # On-disk layout
//!
//! ```text
//! [HEADER_BYTES]
//! [BLOOM_LEN_LE][BLOOM_BYTES][BLOOM_CRC32_LE]
//! [RECORD_LEN_LE][RECORD_BYTES][RECORD_CRC32_LE]
//! [RECORD_LEN_LE][RECORD_BYTES][RECORD_CRC32_LE]
//! ...
//! ```
//!
//! - **Header** — magic + version, CRC-protected.
//! - **Bloom block** — the serialized bitmap of a [`bloomfilter::Bloom`]
//!   covering every live key written into this file.
//! - **Record blocks** — one [`KeyValueRecord`] per block, sorted
//!   ascending by key. Tombstones may appear alongside live records: the
//!   builder writes whatever it is given verbatim, since dropping a
//!   tombstone here could let an older SSTable's value for the same key
//!   resurface on read. Callers that want dead entries reclaimed (namely
//!   compaction) filter before calling the builder. A file is written
//!   only when there is at least one record to write.
//!
//! # Read path
//!
//! A point lookup first checks the bloom filter; a negative check skips
//! the file entirely. A positive check (true or false) falls through to
//! a forward linear scan starting right after the bloom block; the scan
//! stops as soon as it passes the target key, since records are sorted.
//!
//! # Sub-modules
//!
//! - [`builder`] — [`SstableBuilder`] for building a new file from a
//!   sorted record sequence.

#[cfg(test)]
mod tests;

pub mod builder;

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use bloomfilter::Bloom;
use crc32fast::Hasher as Crc32;
use memmap2::Mmap;
use thiserror::Error;

use crate::encoding::{self, Decode, Encode, EncodingError};
use crate::record::{self, KeyValueRecord};

pub use builder::SstableBuilder;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

const SST_MAGIC: [u8; 4] = *b"SST1";
const SST_VERSION: u32 = 1;

/// Header payload size before the trailing CRC (magic + version).
const SST_HEADER_ENCODED_SIZE: usize = 4 + 4;
/// Total on-disk header size including its CRC32.
const SST_HEADER_DISK_SIZE: usize = SST_HEADER_ENCODED_SIZE + 4;

const BLOCK_LEN_SIZE: usize = 4;
const BLOCK_CRC_SIZE: usize = 4;

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

/// Errors produced while building, opening, or reading an SSTable.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SSTableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("checksum mismatch in {0}")]
    ChecksumMismatch(&'static str),

    #[error("corrupt SSTable: {0}")]
    Corrupt(String),

    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Header
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct SSTableHeader {
    magic: [u8; 4],
    version: u32,
}

impl SSTableHeader {
    fn new() -> Self {
        Self {
            magic: SST_MAGIC,
            version: SST_VERSION,
        }
    }
}

impl Encode for SSTableHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.magic.encode_to(buf)?;
        self.version.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for SSTableHeader {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (magic, n) = <[u8; 4]>::decode_from(&buf[off..])?;
        off += n;
        let (version, n) = u32::decode_from(&buf[off..])?;
        off += n;
        Ok((Self { magic, version }, off))
    }
}

fn compute_crc(bytes: &[u8]) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(bytes);
    hasher.finalize()
}

// ------------------------------------------------------------------------------------------------
// Lookup result
// ------------------------------------------------------------------------------------------------

/// Outcome of a point lookup inside a single SSTable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key was found and is live.
    Found(Vec<u8>),
    /// The key was found but is a tombstone or has expired.
    NotFound,
    /// The bloom filter ruled out this file; the caller should consult
    /// the next (older) SSTable.
    Absent,
}

// ------------------------------------------------------------------------------------------------
// SSTable
// ------------------------------------------------------------------------------------------------

/// A single immutable, memory-mapped SSTable file.
pub struct SSTable {
    id: u64,
    path: PathBuf,
    mmap: Mmap,
    bloom: Bloom<Vec<u8>>,
    records_offset: usize,
}

impl SSTable {
    /// Opens an existing SSTable file at `path`, identified by `id`.
    pub fn open(path: impl AsRef<Path>, id: u64) -> Result<Self, SSTableError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: the file is immutable for the lifetime of this SSTable;
        // nothing else in this process writes to an `.sst` file after it
        // has been published by flush or compaction.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SST_HEADER_DISK_SIZE {
            return Err(SSTableError::Corrupt("file shorter than header".into()));
        }

        let header_bytes = &mmap[..SST_HEADER_ENCODED_SIZE];
        let stored_crc = u32::from_le_bytes(
            mmap[SST_HEADER_ENCODED_SIZE..SST_HEADER_DISK_SIZE]
                .try_into()
                .expect("slice of len 4"),
        );
        if compute_crc(header_bytes) != stored_crc {
            return Err(SSTableError::ChecksumMismatch("header"));
        }
        let (header, _) = SSTableHeader::decode_from(header_bytes)?;
        if header.magic != SST_MAGIC {
            return Err(SSTableError::Corrupt("bad magic".into()));
        }
        if header.version != SST_VERSION {
            return Err(SSTableError::Corrupt(format!(
                "unsupported version {}",
                header.version
            )));
        }

        let (bloom_bytes, after_bloom) = read_block(&mmap, SST_HEADER_DISK_SIZE, "bloom")?;
        let bloom = Bloom::from_slice(&bloom_bytes)
            .map_err(|e| SSTableError::Corrupt(format!("bloom filter: {e:?}")))?;

        Ok(Self {
            id,
            path,
            mmap,
            bloom,
            records_offset: after_bloom,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up `key`, resolving tombstones and TTL expiry against `now_secs`.
    pub fn get(&self, key: &[u8], now_secs: i64) -> Result<Lookup, SSTableError> {
        if !self.bloom.check(key) {
            return Ok(Lookup::Absent);
        }

        let mut offset = self.records_offset;
        while offset < self.mmap.len() {
            let (record_bytes, next_offset) = read_block(&self.mmap, offset, "record")?;
            let (record, _) = KeyValueRecord::decode_from(&record_bytes)?;
            match record.key.as_slice().cmp(key) {
                std::cmp::Ordering::Less => {
                    offset = next_offset;
                    continue;
                }
                std::cmp::Ordering::Greater => break,
                std::cmp::Ordering::Equal => {
                    if record.value.is_tombstone() || record::is_expired(record.ttl, now_secs) {
                        return Ok(Lookup::NotFound);
                    }
                    return Ok(Lookup::Found(
                        record.value.as_live().expect("checked not tombstone").to_vec(),
                    ));
                }
            }
        }

        Ok(Lookup::NotFound)
    }

    /// Returns every record whose key lies in `[start, end)`, in ascending
    /// order, including tombstones and expired entries — callers resolve
    /// visibility themselves. Used by cursors and compaction.
    pub fn scan(&self, start: &[u8], end: &[u8]) -> Result<Vec<KeyValueRecord>, SSTableError> {
        let mut out = Vec::new();
        for record in self.iter_records() {
            let record = record?;
            if record.key.as_slice() >= end {
                break;
            }
            if record.key.as_slice() >= start {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Iterates every record in the file, in ascending key order.
    pub fn iter_records(&self) -> RecordIter<'_> {
        RecordIter {
            mmap: &self.mmap,
            offset: self.records_offset,
        }
    }
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Forward iterator over every record stored in an [`SSTable`].
pub struct RecordIter<'a> {
    mmap: &'a Mmap,
    offset: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<KeyValueRecord, SSTableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.mmap.len() {
            return None;
        }
        match read_block(self.mmap, self.offset, "record") {
            Ok((bytes, next_offset)) => {
                self.offset = next_offset;
                match KeyValueRecord::decode_from(&bytes) {
                    Ok((record, _)) => Some(Ok(record)),
                    Err(e) => Some(Err(SSTableError::Encoding(e))),
                }
            }
            Err(e) => {
                self.offset = self.mmap.len();
                Some(Err(e))
            }
        }
    }
}

/// Reads a `[len][bytes][crc32]` framed block starting at `offset`.
/// Returns the block's payload and the offset of the byte right after it.
fn read_block(
    mmap: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<(Vec<u8>, usize), SSTableError> {
    if offset + BLOCK_LEN_SIZE > mmap.len() {
        return Err(SSTableError::Corrupt(format!("truncated {what} length")));
    }
    let len = u32::from_le_bytes(
        mmap[offset..offset + BLOCK_LEN_SIZE]
            .try_into()
            .expect("slice of len 4"),
    ) as usize;
    let payload_start = offset + BLOCK_LEN_SIZE;
    let payload_end = payload_start + len;
    let crc_end = payload_end + BLOCK_CRC_SIZE;
    if crc_end > mmap.len() {
        return Err(SSTableError::Corrupt(format!("truncated {what} payload")));
    }
    let payload = &mmap[payload_start..payload_end];
    let stored_crc = u32::from_le_bytes(
        mmap[payload_end..crc_end].try_into().expect("slice of len 4"),
    );
    if compute_crc(payload) != stored_crc {
        return Err(SSTableError::ChecksumMismatch(what));
    }
    Ok((payload.to_vec(), crc_end))
}

/// Writes a `[len][bytes][crc32]` framed block into `buf`.
pub(crate) fn write_block(buf: &mut Vec<u8>, payload: &[u8]) {
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&compute_crc(payload).to_le_bytes());
}

pub(crate) fn encode_header(buf: &mut Vec<u8>) -> Result<(), EncodingError> {
    let header = SSTableHeader::new();
    let mut header_bytes = Vec::with_capacity(SST_HEADER_ENCODED_SIZE);
    encoding::Encode::encode_to(&header, &mut header_bytes)?;
    let crc = compute_crc(&header_bytes);
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(())
}
