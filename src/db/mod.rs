//! Database: the top-level embedded object.
//!
//! Owns the single database-wide WAL, the background flush pipeline, and
//! the dynamic set of column families. Mediates open/close, point
//! reads/writes, transactions, cursors, and compaction.
//!
//! Lock order, outermost first: `column_families` → a column family's own
//! internal locks → the flush pipeline's queue lock → the WAL's internal
//! file lock. No path in this module acquires them out of order.


use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::column_family::{ColumnFamily, ColumnFamilyConfig, ColumnFamilyError};
use crate::compaction::{self, CompactionError, CompactionReport};
use crate::cursor::{Cursor, CursorError};
use crate::flush::{FlushJob, FlushPipeline};
use crate::record::{KeyValueRecord, Operation};
use crate::txn::{Transaction, TxnError};
use crate::wal::{Wal, WalError};

const WAL_FILE_NAME: &str = ".wal";

/// Errors raised by top-level [`Database`] operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DbError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    ColumnFamily(#[from] ColumnFamilyError),

    #[error(transparent)]
    Wal(#[from] WalError),

    #[error(transparent)]
    Compaction(#[from] CompactionError),

    #[error(transparent)]
    Txn(#[from] TxnError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Database-wide configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub db_path: PathBuf,
    pub compressed_wal: bool,
    pub flush_thread_idle: Duration,
    pub compaction_thread_pool_size: usize,
}

impl DbConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            compressed_wal: false,
            flush_thread_idle: Duration::from_millis(50),
            compaction_thread_pool_size: 2,
        }
    }
}

/// The embedded database: one WAL, one flush pipeline, many column families.
pub struct Database {
    config: DbConfig,
    column_families: RwLock<HashMap<String, Arc<ColumnFamily>>>,
    wal: Arc<Wal<Operation>>,
    flush: FlushPipeline,
}

impl Database {
    /// Opens (creating if missing) the database directory at
    /// `config.db_path`, loads every column family found there, spawns the
    /// flush worker, and replays the WAL into memtables.
    pub fn open(config: DbConfig) -> Result<Self, DbError> {
        fs::create_dir_all(&config.db_path)?;

        let wal = Arc::new(Wal::open(config.db_path.join(WAL_FILE_NAME), None)?);

        let mut column_families = HashMap::new();
        for entry in fs::read_dir(&config.db_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let cf = ColumnFamily::load(&config.db_path, &dir_name)?;
            column_families.insert(dir_name, Arc::new(cf));
        }

        let flush = FlushPipeline::start(Arc::clone(&wal));

        let db = Self {
            config,
            column_families: RwLock::new(column_families),
            wal,
            flush,
        };
        db.replay_wal()?;

        info!(path = %db.config.db_path.display(), column_families = db.column_families_count()?, "database opened");
        Ok(db)
    }

    /// Replays every operation recorded in the WAL into its target column
    /// family's memtable. Stops at the first deserialization or read
    /// failure without failing the open — this is best-effort recovery.
    fn replay_wal(&self) -> Result<(), DbError> {
        let mut replayed = 0u64;
        for result in self.wal.replay_iter()? {
            let op = match result {
                Ok(op) => op,
                Err(e) => {
                    warn!(error = %e, "WAL replay stopped at first unreadable record");
                    break;
                }
            };

            let guard = self.column_families.read().map_err(|_| {
                DbError::Internal("column families lock poisoned".into())
            })?;
            match guard.get(&op.column_family) {
                Some(cf) => {
                    cf.apply(op.record)?;
                    replayed += 1;
                }
                None => {
                    warn!(cf = %op.column_family, "WAL replay skipped op for unknown column family");
                }
            }
        }
        debug!(replayed, "WAL replay finished");
        Ok(())
    }

    fn column_families_count(&self) -> Result<usize, DbError> {
        Ok(self
            .column_families
            .read()
            .map_err(|_| DbError::Internal("column families lock poisoned".into()))?
            .len())
    }

    /// Flushes the worker's remaining queue and releases its thread.
    /// Column families and the WAL drop naturally once `self` is dropped.
    pub fn close(mut self) -> Result<(), DbError> {
        self.flush.shutdown();
        info!("database closed");
        Ok(())
    }

    fn get_column_family(&self, name: &str) -> Result<Arc<ColumnFamily>, DbError> {
        let guard = self
            .column_families
            .read()
            .map_err(|_| DbError::Internal("column families lock poisoned".into()))?;
        guard
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("column family '{name}' not found")))
    }

    /// Creates a new column family. Fails with [`DbError::Conflict`] if one
    /// with the same name already exists.
    pub fn create_column_family(&self, config: ColumnFamilyConfig) -> Result<(), DbError> {
        let mut guard = self
            .column_families
            .write()
            .map_err(|_| DbError::Internal("column families lock poisoned".into()))?;
        if guard.contains_key(&config.name) {
            return Err(DbError::Conflict(format!(
                "column family '{}' already exists",
                config.name
            )));
        }
        let name = config.name.clone();
        let cf = ColumnFamily::create(&self.config.db_path, config)?;
        guard.insert(name, Arc::new(cf));
        Ok(())
    }

    /// Drops a column family, removing its directory and every SSTable it
    /// owns from disk.
    pub fn drop_column_family(&self, name: &str) -> Result<(), DbError> {
        let mut guard = self
            .column_families
            .write()
            .map_err(|_| DbError::Internal("column families lock poisoned".into()))?;
        let cf = guard
            .remove(name)
            .ok_or_else(|| DbError::Conflict(format!("column family '{name}' not found")))?;
        fs::remove_dir_all(cf.path())?;
        debug!(cf = %name, "column family dropped");
        Ok(())
    }

    /// Appends a `PUT` to the WAL, applies it to `cf`'s memtable, and
    /// enqueues a flush if the memtable has crossed its threshold.
    pub fn put(
        &self,
        cf: &str,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        ttl: i64,
    ) -> Result<(), DbError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DbError::InvalidArgument("key must not be empty".into()));
        }
        let column_family = self.get_column_family(cf)?;
        let record = KeyValueRecord::live(key, value, ttl);
        self.wal.append(&Operation::put(cf, record.clone()))?;
        column_family.apply(record)?;
        self.maybe_enqueue_flush(&column_family)?;
        Ok(())
    }

    /// Looks up `key` in `cf`: memtable first, then SSTables newest to oldest.
    pub fn get(&self, cf: &str, key: &[u8], now_secs: i64) -> Result<Option<Vec<u8>>, DbError> {
        let column_family = self.get_column_family(cf)?;
        Ok(column_family.get(key, now_secs)?)
    }

    /// Appends a `DELETE` (tombstone) to the WAL and applies it.
    pub fn delete(&self, cf: &str, key: impl Into<Vec<u8>>) -> Result<(), DbError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DbError::InvalidArgument("key must not be empty".into()));
        }
        let column_family = self.get_column_family(cf)?;
        self.wal.append(&Operation::delete(cf, key.clone()))?;
        column_family.apply(KeyValueRecord::tombstone(key))?;
        self.maybe_enqueue_flush(&column_family)?;
        Ok(())
    }

    /// Freezes and enqueues `cf`'s memtable for flush if it has crossed its
    /// configured byte threshold, recording the WAL's current size as the
    /// checkpoint the flush worker truncates to once materialized.
    fn maybe_enqueue_flush(&self, cf: &Arc<ColumnFamily>) -> Result<(), DbError> {
        if !cf.should_flush()? {
            return Ok(());
        }
        let checkpoint = self.wal.size()?;
        let snapshot = cf.freeze_memtable()?;
        self.flush.enqueue(FlushJob {
            column_family: Arc::clone(cf),
            snapshot,
            checkpoint,
        });
        Ok(())
    }

    /// Runs one round of pairwise SSTable compaction over `cf`.
    pub fn compact_sstables(
        &self,
        cf: &str,
        max_threads: usize,
        now_secs: i64,
    ) -> Result<CompactionReport, DbError> {
        let column_family = self.get_column_family(cf)?;
        Ok(compaction::compact(&column_family, max_threads, now_secs)?)
    }

    /// Begins a transaction scoped to `cf`. The column family need not be
    /// looked up until commit/rollback time.
    pub fn begin_txn(&self, cf: impl Into<String>) -> Transaction {
        Transaction::begin(cf)
    }

    /// Applies every uncommitted op in `txn` to its column family's
    /// memtable, then checks the flush threshold once.
    pub fn commit_txn(&self, txn: &mut Transaction) -> Result<(), DbError> {
        let column_family = self.get_column_family(txn.column_family())?;
        txn.commit(&column_family)?;
        self.maybe_enqueue_flush(&column_family)?;
        Ok(())
    }

    /// Undoes every committed op in `txn`, in reverse order.
    pub fn rollback_txn(&self, txn: &mut Transaction) -> Result<(), DbError> {
        let column_family = self.get_column_family(txn.column_family())?;
        txn.rollback(&column_family)?;
        Ok(())
    }

    /// Opens a cursor over `cf`, positioned before the first record.
    pub fn cursor_init(&self, cf: &str, now_secs: i64) -> Result<Cursor, DbError> {
        let column_family = self.get_column_family(cf)?;
        Ok(Cursor::init(column_family, now_secs)?)
    }
}
