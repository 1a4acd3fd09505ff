//! Column family: an independent keyspace within one database.
//!
//! A column family owns exactly one memtable, an ordered list of
//! SSTables (oldest first), and a monotonic id generator for the
//! filenames of new SSTables it creates. Its configuration is persisted
//! as a small file inside its own directory (`<db_path>/<name>/config.cfc`)
//! so that reopening the database can rediscover it by scanning
//! `db_path` for subdirectories — there is no central manifest file.


use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::encoding::{self, Decode, Encode, EncodingError};
use crate::memtable::{Memtable, MemtableError};
use crate::record::{self, KeyValueRecord};
use crate::sstable::{Lookup, SSTable, SSTableError, SstableBuilder};

const CONFIG_FILE_NAME: &str = "config.cfc";
const MIN_NAME_LEN: usize = 2;
const MIN_FLUSH_THRESHOLD_BYTES: u64 = 1024 * 1024;
const MIN_MAX_LEVEL: u32 = 5;
const MIN_PROBABILITY: f64 = 0.1;

// ------------------------------------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ColumnFamilyError {
    #[error("invalid column family config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Memtable(#[from] MemtableError),

    #[error(transparent)]
    Sstable(#[from] SSTableError),

    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Per-column-family configuration, persisted alongside its SSTables.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFamilyConfig {
    pub name: String,
    pub flush_threshold_bytes: u64,
    pub max_level: u32,
    pub probability: f64,
    pub compressed: bool,
}

impl ColumnFamilyConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flush_threshold_bytes: MIN_FLUSH_THRESHOLD_BYTES,
            max_level: MIN_MAX_LEVEL,
            probability: MIN_PROBABILITY,
            compressed: false,
        }
    }

    fn validate(&self) -> Result<(), ColumnFamilyError> {
        if self.name.len() < MIN_NAME_LEN {
            return Err(ColumnFamilyError::InvalidConfig(format!(
                "name must be at least {MIN_NAME_LEN} characters"
            )));
        }
        if self.flush_threshold_bytes < MIN_FLUSH_THRESHOLD_BYTES {
            return Err(ColumnFamilyError::InvalidConfig(format!(
                "flush_threshold_bytes must be >= {MIN_FLUSH_THRESHOLD_BYTES}"
            )));
        }
        if self.max_level < MIN_MAX_LEVEL {
            return Err(ColumnFamilyError::InvalidConfig(format!(
                "max_level must be >= {MIN_MAX_LEVEL}"
            )));
        }
        if self.probability < MIN_PROBABILITY {
            return Err(ColumnFamilyError::InvalidConfig(format!(
                "probability must be >= {MIN_PROBABILITY}"
            )));
        }
        Ok(())
    }
}

impl Encode for ColumnFamilyConfig {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.name.encode_to(buf)?;
        self.flush_threshold_bytes.encode_to(buf)?;
        self.max_level.encode_to(buf)?;
        self.probability.to_bits().encode_to(buf)?;
        self.compressed.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for ColumnFamilyConfig {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (name, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (flush_threshold_bytes, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (max_level, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let (probability_bits, n) = u64::decode_from(&buf[off..])?;
        off += n;
        let (compressed, n) = bool::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                name,
                flush_threshold_bytes,
                max_level,
                probability: f64::from_bits(probability_bits),
                compressed,
            },
            off,
        ))
    }
}

// ------------------------------------------------------------------------------------------------
// Column family
// ------------------------------------------------------------------------------------------------

/// One independent keyspace: its own memtable, SSTables, and config.
pub struct ColumnFamily {
    pub config: ColumnFamilyConfig,
    path: PathBuf,
    memtable: RwLock<Memtable>,
    /// Oldest-first; the last element is the newest SSTable.
    sstables: RwLock<Vec<Arc<SSTable>>>,
    next_sstable_id: AtomicU64,
}

impl ColumnFamily {
    /// Creates a brand-new column family directory under `db_path` and
    /// persists its config file.
    pub fn create(db_path: &Path, config: ColumnFamilyConfig) -> Result<Self, ColumnFamilyError> {
        config.validate()?;
        let path = db_path.join(&config.name);
        fs::create_dir_all(&path)?;
        write_config(&path, &config)?;
        debug!(name = %config.name, path = %path.display(), "column family created");
        Ok(Self {
            config,
            path,
            memtable: RwLock::new(Memtable::new()),
            sstables: RwLock::new(Vec::new()),
            next_sstable_id: AtomicU64::new(0),
        })
    }

    /// Reloads an existing column family directory: its persisted config,
    /// every `.sst` file inside it (sorted oldest-first by modification
    /// time), and the next id to hand out for new SSTables.
    pub fn load(db_path: &Path, dir_name: &str) -> Result<Self, ColumnFamilyError> {
        let path = db_path.join(dir_name);
        let config = read_config(&path)?;

        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let entry_path = entry.path();
            if entry_path.extension().and_then(|e| e.to_str()) == Some("sst") {
                let modified = entry.metadata()?.modified()?;
                entries.push((entry_path, modified));
            }
        }
        entries.sort_by_key(|(_, modified)| *modified);

        let mut sstables = Vec::with_capacity(entries.len());
        let mut max_id = 0u64;
        for (sst_path, _) in entries {
            let id = parse_sstable_id(&sst_path).unwrap_or_else(|| {
                warn!(path = %sst_path.display(), "sstable filename does not match sstable_<id>.sst, using 0");
                0
            });
            max_id = max_id.max(id);
            sstables.push(Arc::new(SSTable::open(&sst_path, id)?));
        }

        debug!(name = %config.name, sstables = sstables.len(), "column family loaded");
        Ok(Self {
            config,
            path,
            memtable: RwLock::new(Memtable::new()),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(max_id + 1),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies an already-WAL-durable mutation to the in-memory memtable.
    pub fn apply(&self, record: KeyValueRecord) -> Result<(), ColumnFamilyError> {
        trace!(cf = %self.config.name, "column family apply");
        let guard = self.memtable.read().map_err(|_| {
            ColumnFamilyError::Internal("memtable lock poisoned".into())
        })?;
        guard.apply(record)?;
        Ok(())
    }

    /// Current approximate key+value byte footprint of the live memtable.
    pub fn approximate_size(&self) -> Result<usize, ColumnFamilyError> {
        let guard = self.memtable.read().map_err(|_| {
            ColumnFamilyError::Internal("memtable lock poisoned".into())
        })?;
        Ok(guard.approximate_size())
    }

    /// `true` once the live memtable has crossed this family's flush threshold.
    pub fn should_flush(&self) -> Result<bool, ColumnFamilyError> {
        Ok(self.approximate_size()? as u64 >= self.config.flush_threshold_bytes)
    }

    /// Read-only snapshot of every record currently held in the live
    /// memtable, in ascending key order. Used by cursors; unlike
    /// [`ColumnFamily::freeze_memtable`] this does not swap the memtable out.
    pub fn memtable_snapshot(&self) -> Result<Vec<KeyValueRecord>, ColumnFamilyError> {
        let guard = self
            .memtable
            .read()
            .map_err(|_| ColumnFamilyError::Internal("memtable lock poisoned".into()))?;
        Ok(guard.iter()?)
    }

    /// Atomically swaps the live memtable out for a fresh, empty one and
    /// returns the frozen snapshot for the flush worker to materialize.
    pub fn freeze_memtable(&self) -> Result<Memtable, ColumnFamilyError> {
        let mut guard = self.memtable.write().map_err(|_| {
            ColumnFamilyError::Internal("memtable lock poisoned".into())
        })?;
        Ok(std::mem::replace(&mut *guard, Memtable::new()))
    }

    /// Allocates the next monotonically increasing SSTable id for this family.
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn sstable_path(&self, id: u64) -> PathBuf {
        self.path.join(format!("sstable_{id}.sst"))
    }

    /// Appends a freshly written SSTable to the newest end of the list.
    pub fn install_sstable(&self, sstable: SSTable) -> Result<(), ColumnFamilyError> {
        let mut guard = self.sstables.write().map_err(|_| {
            ColumnFamilyError::Internal("sstables lock poisoned".into())
        })?;
        guard.push(Arc::new(sstable));
        Ok(())
    }

    /// Returns a snapshot of the current SSTable list, oldest first.
    pub fn list_sstables(&self) -> Result<Vec<Arc<SSTable>>, ColumnFamilyError> {
        let guard = self.sstables.read().map_err(|_| {
            ColumnFamilyError::Internal("sstables lock poisoned".into())
        })?;
        Ok(guard.clone())
    }

    /// Replaces the SSTable list wholesale, used after a compaction round.
    pub fn replace_sstables(&self, new_list: Vec<Arc<SSTable>>) -> Result<(), ColumnFamilyError> {
        let mut guard = self.sstables.write().map_err(|_| {
            ColumnFamilyError::Internal("sstables lock poisoned".into())
        })?;
        *guard = new_list;
        Ok(())
    }

    /// Looks up `key`: memtable first, then SSTables newest to oldest.
    pub fn get(&self, key: &[u8], now_secs: i64) -> Result<Option<Vec<u8>>, ColumnFamilyError> {
        {
            let memtable = self.memtable.read().map_err(|_| {
                ColumnFamilyError::Internal("memtable lock poisoned".into())
            })?;
            if let Some(found) = memtable.get(key)? {
                if found.value.is_tombstone() || record::is_expired(found.ttl, now_secs) {
                    return Ok(None);
                }
                return Ok(found.value.as_live().map(<[u8]>::to_vec));
            }
        }

        let sstables = self.sstables.read().map_err(|_| {
            ColumnFamilyError::Internal("sstables lock poisoned".into())
        })?;
        for sstable in sstables.iter().rev() {
            match sstable.get(key, now_secs)? {
                Lookup::Found(value) => return Ok(Some(value)),
                Lookup::NotFound => return Ok(None),
                Lookup::Absent => continue,
            }
        }
        Ok(None)
    }

    /// Materializes the given frozen memtable snapshot as a new SSTable
    /// file. Tombstones and expired records are dropped before the bloom
    /// filter is built or anything is written, mirroring `pair_merge`; a
    /// snapshot that resolves to zero live records produces no file.
    pub fn materialize_flush(&self, frozen: &Memtable, now_secs: i64) -> Result<bool, ColumnFamilyError> {
        let records: Vec<_> = frozen
            .iter()?
            .into_iter()
            .filter(|r| r.is_visible(now_secs))
            .collect();
        let id = self.next_sstable_id();
        let path = self.sstable_path(id);
        let written = SstableBuilder::build(&path, &records, self.config.probability)?;
        match written {
            Some(_) => {
                self.install_sstable(SSTable::open(&path, id)?)?;
                debug!(cf = %self.config.name, id, "flush materialized sstable");
                Ok(true)
            }
            None => {
                debug!(cf = %self.config.name, "flush produced no records, skipping sstable");
                Ok(false)
            }
        }
    }
}

fn write_config(path: &Path, config: &ColumnFamilyConfig) -> Result<(), ColumnFamilyError> {
    let bytes = encoding::encode_to_vec(config)?;
    fs::write(path.join(CONFIG_FILE_NAME), bytes)?;
    Ok(())
}

fn read_config(path: &Path) -> Result<ColumnFamilyConfig, ColumnFamilyError> {
    let bytes = fs::read(path.join(CONFIG_FILE_NAME))?;
    let (config, _) = encoding::decode_from_slice::<ColumnFamilyConfig>(&bytes)?;
    Ok(config)
}

/// Parses the `<id>` out of a `sstable_<id>.sst` filename.
fn parse_sstable_id(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("sstable_")?.parse().ok()
}
