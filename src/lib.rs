//! # StratumKV
//!
//! An embeddable, persistent key-value storage engine built on a
//! **Log-Structured Merge Tree (LSM-tree)** architecture, organized around
//! column families: independent keyspaces that each own a memtable and an
//! ordered list of SSTables inside one shared database directory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Database                          │
//! │  ┌────────────────────┐        ┌─────────────────────┐   │
//! │  │   Column family A   │        │   Column family B    │   │
//! │  │  memtable + ssts[]  │        │  memtable + ssts[]   │   │
//! │  └──────────┬──────────┘        └───────────┬─────────┘   │
//! │             │ freeze                        │ freeze      │
//! │             └───────────────┬────────────────┘             │
//! │                             ▼                              │
//! │                    Flush pipeline (FIFO)                   │
//! │                             │ materialize                  │
//! │                             ▼                               │
//! │                  new SSTable + WAL checkpoint truncation     │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │         single shared write-ahead log (.wal)          │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`db`] | Top-level embedded object — open, close, put/get/delete, transactions, cursors, compaction |
//! | [`column_family`] | An independent keyspace: memtable, SSTables, config |
//! | [`memtable`] | In-memory write buffer, one latest record per key |
//! | [`wal`] | Generic, CRC-protected write-ahead log for crash recovery |
//! | [`sstable`] | Immutable, bloom-filter-gated, on-disk tables |
//! | [`flush`] | Background pipeline materializing frozen memtables into SSTables |
//! | [`compaction`] | Pairwise SSTable compaction |
//! | [`txn`] | Single-column-family transactions with commit/rollback |
//! | [`cursor`] | Ordered traversal over a column family's memtable and SSTables |
//!
//! ## Key Features
//!
//! - **Column-family isolation** — each keyspace owns its own memtable,
//!   SSTables, and flush threshold, persisted as a config file inside its
//!   own directory.
//! - **Write-ahead logging** — every mutation is persisted to a
//!   database-wide WAL before being applied, guaranteeing durability and
//!   crash recovery.
//! - **Asynchronous flush pipeline** — a dedicated worker drains frozen
//!   memtable snapshots into SSTables and truncates the WAL behind them.
//! - **Bloom filter lookups** — each SSTable carries a bloom filter for
//!   fast negative point-lookup responses, gating a linear forward scan.
//! - **Pairwise compaction** — neighbouring SSTables are merged two at a
//!   time across a caller-chosen number of worker threads.
//! - **Transactions and cursors** — single-column-family transactional
//!   batches, and ordered traversal across a column family's levels.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stratumkv::db::{Database, DbConfig};
//! use stratumkv::column_family::ColumnFamilyConfig;
//!
//! let db = Database::open(DbConfig::new("/tmp/my_db")).unwrap();
//! db.create_column_family(ColumnFamilyConfig::new("default")).unwrap();
//!
//! // Write
//! db.put("default", b"hello".to_vec(), b"world".to_vec(), 0).unwrap();
//!
//! // Read
//! assert_eq!(db.get("default", b"hello", 0).unwrap(), Some(b"world".to_vec()));
//!
//! // Delete
//! db.delete("default", b"hello".to_vec()).unwrap();
//! assert_eq!(db.get("default", b"hello", 0).unwrap(), None);
//!
//! // Graceful shutdown
//! db.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod column_family;
pub mod compaction;
pub mod cursor;
pub mod db;
pub mod encoding;
pub mod flush;
pub mod memtable;
pub mod record;
pub mod sstable;
pub mod txn;
pub mod wal;
