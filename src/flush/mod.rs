//! Flush pipeline: a single background worker that drains frozen memtable
//! snapshots into SSTables and truncates the write-ahead log behind them.
//!
//! Writers never flush inline. When a write pushes a column family's
//! memtable over its threshold, the caller snapshots the memtable, records
//! the WAL's current byte size as a checkpoint, and hands both to this
//! pipeline. The worker thread drains the FIFO one job at a time; each
//! materialized flush truncates the shared WAL up to that job's checkpoint,
//! discarding the log bytes the new SSTable now makes durable elsewhere.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::column_family::{ColumnFamily, ColumnFamilyError};
use crate::memtable::Memtable;
use crate::record::{self, Operation};
use crate::wal::{Wal, WalError};

/// Errors raised while materializing a single flush job.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlushError {
    #[error(transparent)]
    ColumnFamily(#[from] ColumnFamilyError),
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// A frozen memtable snapshot awaiting materialization as a new SSTable.
pub struct FlushJob {
    pub column_family: Arc<ColumnFamily>,
    pub snapshot: Memtable,
    /// WAL byte offset recorded at the moment this snapshot was frozen;
    /// the WAL is truncated to this offset once the snapshot lands safely
    /// on disk as an SSTable.
    pub checkpoint: u64,
}

struct State {
    jobs: VecDeque<FlushJob>,
    stop: bool,
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

/// Owns the flush FIFO and its single background worker thread.
pub struct FlushPipeline {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl FlushPipeline {
    /// Spawns the background worker bound to `wal`. The worker runs until
    /// [`FlushPipeline::shutdown`] is called (or the pipeline is dropped).
    pub fn start(wal: Arc<Wal<Operation>>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                jobs: VecDeque::new(),
                stop: false,
            }),
            cond: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || flush_worker_loop(worker_shared, wal));

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Enqueues a frozen memtable snapshot and wakes the worker.
    pub fn enqueue(&self, job: FlushJob) {
        let mut state = self.shared.state.lock().expect("flush queue lock poisoned");
        state.jobs.push_back(job);
        self.shared.cond.notify_one();
    }

    /// Number of jobs currently queued (not including one in flight).
    pub fn pending(&self) -> usize {
        self.shared
            .state
            .lock()
            .expect("flush queue lock poisoned")
            .jobs
            .len()
    }

    /// Signals the worker to drain the remaining queue and exit, then joins
    /// it. Safe to call more than once.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("flush queue lock poisoned");
            state.stop = true;
        }
        self.shared.cond.notify_all();
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            error!("flush worker thread panicked during shutdown");
        }
    }
}

impl Drop for FlushPipeline {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

fn flush_worker_loop(shared: Arc<Shared>, wal: Arc<Wal<Operation>>) {
    loop {
        let job = {
            let mut state = shared.state.lock().expect("flush queue lock poisoned");
            loop {
                if let Some(job) = state.jobs.pop_front() {
                    break Some(job);
                }
                if state.stop {
                    break None;
                }
                state = shared.cond.wait(state).expect("flush queue lock poisoned");
            }
        };

        let Some(job) = job else {
            debug!("flush worker exiting");
            return;
        };

        let cf_name = job.column_family.name().to_string();
        if let Err(e) = materialize(&job, &wal) {
            warn!(cf = %cf_name, error = %e, "flush worker dropped a job after failure");
        }
    }
}

fn materialize(job: &FlushJob, wal: &Wal<Operation>) -> Result<(), FlushError> {
    job.column_family
        .materialize_flush(&job.snapshot, record::now_unix_secs())?;
    wal.truncate_to(job.checkpoint)?;
    Ok(())
}
