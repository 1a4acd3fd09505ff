//! Micro-benchmarks for StratumKV core operations.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro              # run all micro-benchmarks
//! cargo bench --bench micro -- put       # filter by name
//! ```

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use stratumkv::column_family::ColumnFamilyConfig;
use stratumkv::db::{Database, DbConfig};
use tempfile::TempDir;

const VALUE_128B: &[u8; 128] = &[0xAB; 128];
const VALUE_1K: &[u8; 1024] = &[0xCD; 1024];

fn make_key(i: u64) -> Vec<u8> {
    format!("key-{i:012}").into_bytes()
}

/// Opens a fresh database with one column family ("bench"), left at its
/// 1 MiB minimum flush threshold so sustained-write benchmarks exercise
/// the flush pipeline.
fn open_bench_db(dir: &std::path::Path) -> Database {
    let db = Database::open(DbConfig::new(dir)).expect("open");
    db.create_column_family(ColumnFamilyConfig::new("bench"))
        .expect("create cf");
    db
}

fn prepopulate(dir: &std::path::Path, count: u64, value: &[u8]) {
    let db = open_bench_db(dir);
    for i in 0..count {
        db.put("bench", make_key(i), value.to_vec(), 0).unwrap();
    }
    db.close().unwrap();
}

// ================================================================================================
// Write benchmarks
// ================================================================================================

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    for &size in &[128usize, 1024] {
        let value: Vec<u8> = vec![0xAB; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter_batched(
                || {
                    let tmp = TempDir::new().unwrap();
                    let db = open_bench_db(tmp.path());
                    (tmp, db)
                },
                |(_tmp, db)| {
                    for i in 0..1_000u64 {
                        db.put("bench", make_key(i), black_box(value.clone()), 0)
                            .unwrap();
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

// ================================================================================================
// Read benchmarks
// ================================================================================================

fn bench_get_hit(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    prepopulate(tmp.path(), 5_000, VALUE_128B);
    let db = open_bench_db(tmp.path());

    let mut group = c.benchmark_group("get_hit");
    group.bench_function("sequential", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = make_key(i % 5_000);
            i += 1;
            black_box(db.get("bench", &key, 0).unwrap())
        });
    });
    group.finish();
}

fn bench_get_miss(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    prepopulate(tmp.path(), 5_000, VALUE_128B);
    let db = open_bench_db(tmp.path());

    c.bench_function("get_miss", |b| {
        b.iter(|| black_box(db.get("bench", b"never-inserted", 0).unwrap()));
    });
}

fn bench_delete(c: &mut Criterion) {
    c.bench_function("delete", |b| {
        b.iter_batched(
            || {
                let tmp = TempDir::new().unwrap();
                let db = open_bench_db(tmp.path());
                db.put("bench", b"k".to_vec(), VALUE_1K.to_vec(), 0).unwrap();
                (tmp, db)
            },
            |(_tmp, db)| db.delete("bench", b"k".to_vec()).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_put, bench_get_hit, bench_get_miss, bench_delete);
criterion_main!(benches);
