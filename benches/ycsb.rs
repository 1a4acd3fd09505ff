//! YCSB-style macro-benchmarks for StratumKV.
//!
//! Measures sustained throughput under realistic mixed workloads inspired
//! by the Yahoo Cloud Serving Benchmark (YCSB).
//!
//! # Workloads
//!
//! | Name | Mix | Description |
//! |------|-----|-------------|
//! | **A** | 50% read, 50% update | Session store — heavy read/write |
//! | **B** | 95% read, 5% update | Photo tagging — read-mostly |
//! | **C** | 100% read | User profile cache — read-only |
//! | **D** | 95% read, 5% insert | Read-latest — status updates |
//! | **E** | cursor traversal | Bounded forward scan from the start of a column family |
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench ycsb               # all workloads
//! cargo bench --bench ycsb -- "A"        # workload A only
//! ```

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

use rand::Rng;
use std::hint::black_box;
use stratumkv::column_family::ColumnFamilyConfig;
use stratumkv::db::{Database, DbConfig};
use tempfile::TempDir;

const RECORD_COUNT: u64 = 10_000;
const OPS_PER_RUN: u64 = 2_000;
const VALUE_SIZE: usize = 256;
const SCAN_LENGTH: usize = 50;

fn make_key(i: u64) -> Vec<u8> {
    format!("user{i:012}").into_bytes()
}

fn make_value(rng: &mut impl Rng) -> Vec<u8> {
    let mut buf = vec![0u8; VALUE_SIZE];
    rng.fill(&mut buf[..]);
    buf
}

/// Loads `RECORD_COUNT` records into a fresh database and returns the
/// open handle plus its backing directory (kept alive for the duration of
/// the benchmark).
fn loaded_db() -> (TempDir, Database) {
    let tmp = TempDir::new().unwrap();
    let db = Database::open(DbConfig::new(tmp.path())).unwrap();
    db.create_column_family(ColumnFamilyConfig::new("ycsb")).unwrap();

    let mut rng = rand::rng();
    for i in 0..RECORD_COUNT {
        db.put("ycsb", make_key(i), make_value(&mut rng), 0).unwrap();
    }
    (tmp, db)
}

fn bench_workload_a(c: &mut Criterion) {
    // 50% read, 50% update.
    c.bench_function("ycsb_a_read_update_50_50", |b| {
        b.iter_batched(
            loaded_db,
            |(_tmp, db)| {
                let mut rng = rand::rng();
                for _ in 0..OPS_PER_RUN {
                    let key = make_key(rng.random_range(0..RECORD_COUNT));
                    if rng.random_bool(0.5) {
                        black_box(db.get("ycsb", &key, 0).unwrap());
                    } else {
                        db.put("ycsb", key, make_value(&mut rng), 0).unwrap();
                    }
                }
            },
            BatchSize::PerIteration,
        );
    });
}

fn bench_workload_b(c: &mut Criterion) {
    // 95% read, 5% update.
    c.bench_function("ycsb_b_read_mostly", |b| {
        b.iter_batched(
            loaded_db,
            |(_tmp, db)| {
                let mut rng = rand::rng();
                for _ in 0..OPS_PER_RUN {
                    let key = make_key(rng.random_range(0..RECORD_COUNT));
                    if rng.random_bool(0.95) {
                        black_box(db.get("ycsb", &key, 0).unwrap());
                    } else {
                        db.put("ycsb", key, make_value(&mut rng), 0).unwrap();
                    }
                }
            },
            BatchSize::PerIteration,
        );
    });
}

fn bench_workload_c(c: &mut Criterion) {
    // 100% read.
    c.bench_function("ycsb_c_read_only", |b| {
        b.iter_batched(
            loaded_db,
            |(_tmp, db)| {
                let mut rng = rand::rng();
                for _ in 0..OPS_PER_RUN {
                    let key = make_key(rng.random_range(0..RECORD_COUNT));
                    black_box(db.get("ycsb", &key, 0).unwrap());
                }
            },
            BatchSize::PerIteration,
        );
    });
}

fn bench_workload_d(c: &mut Criterion) {
    // 95% read, 5% insert of a brand-new key.
    c.bench_function("ycsb_d_read_latest", |b| {
        b.iter_batched(
            loaded_db,
            |(_tmp, db)| {
                let mut rng = rand::rng();
                let mut next = RECORD_COUNT;
                for _ in 0..OPS_PER_RUN {
                    if rng.random_bool(0.95) {
                        let key = make_key(rng.random_range(0..RECORD_COUNT));
                        black_box(db.get("ycsb", &key, 0).unwrap());
                    } else {
                        db.put("ycsb", make_key(next), make_value(&mut rng), 0)
                            .unwrap();
                        next += 1;
                    }
                }
            },
            BatchSize::PerIteration,
        );
    });
}

fn bench_workload_e(c: &mut Criterion) {
    // Bounded forward cursor traversal.
    c.bench_function("ycsb_e_cursor_scan", |b| {
        b.iter_batched(
            loaded_db,
            |(_tmp, db)| {
                let mut cursor = db.cursor_init("ycsb", 0).unwrap();
                for _ in 0..SCAN_LENGTH {
                    if cursor.next().is_err() {
                        break;
                    }
                    let _ = black_box(cursor.get());
                }
            },
            BatchSize::PerIteration,
        );
    });
}

criterion_group!(
    benches,
    bench_workload_a,
    bench_workload_b,
    bench_workload_c,
    bench_workload_d,
    bench_workload_e,
);
criterion_main!(benches);
