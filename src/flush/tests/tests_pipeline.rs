#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::column_family::{ColumnFamily, ColumnFamilyConfig};
    use crate::flush::{FlushJob, FlushPipeline};
    use crate::record::{KeyValueRecord, Operation};
    use crate::wal::Wal;

    fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn enqueued_job_is_materialized_and_wal_truncated() {
        let tmp = TempDir::new().unwrap();
        let wal_path = tmp.path().join(".wal");
        let wal: Arc<Wal<Operation>> = Arc::new(Wal::open(&wal_path, None).unwrap());

        let cf = Arc::new(
            ColumnFamily::create(tmp.path(), ColumnFamilyConfig::new("default")).unwrap(),
        );
        cf.apply(KeyValueRecord::live(b"a".to_vec(), b"1".to_vec(), 0))
            .unwrap();
        wal.append(&Operation::put(
            "default",
            KeyValueRecord::live(b"a".to_vec(), b"1".to_vec(), 0),
        ))
        .unwrap();
        let checkpoint = wal.size().unwrap();

        let snapshot = cf.freeze_memtable().unwrap();

        let mut pipeline = FlushPipeline::start(Arc::clone(&wal));
        pipeline.enqueue(FlushJob {
            column_family: Arc::clone(&cf),
            snapshot,
            checkpoint,
        });

        let flushed = wait_until(|| cf.list_sstables().unwrap().len() == 1);
        assert!(flushed, "flush worker did not materialize the job in time");
        assert_eq!(cf.get(b"a", 0).unwrap(), Some(b"1".to_vec()));

        pipeline.shutdown();
        assert_eq!(wal.size().unwrap(), checkpoint);
    }

    #[test]
    fn shutdown_drains_remaining_queue_before_exiting() {
        let tmp = TempDir::new().unwrap();
        let wal_path = tmp.path().join(".wal");
        let wal: Arc<Wal<Operation>> = Arc::new(Wal::open(&wal_path, None).unwrap());
        let cf = Arc::new(
            ColumnFamily::create(tmp.path(), ColumnFamilyConfig::new("default")).unwrap(),
        );

        let mut pipeline = FlushPipeline::start(Arc::clone(&wal));
        for (key, value) in [(b"a".as_slice(), b"1".as_slice()), (b"b", b"2")] {
            cf.apply(KeyValueRecord::live(key.to_vec(), value.to_vec(), 0))
                .unwrap();
            let snapshot = cf.freeze_memtable().unwrap();
            pipeline.enqueue(FlushJob {
                column_family: Arc::clone(&cf),
                snapshot,
                checkpoint: wal.size().unwrap(),
            });
        }

        pipeline.shutdown();
        assert_eq!(cf.list_sstables().unwrap().len(), 2);
        assert_eq!(cf.get(b"a", 0).unwrap(), Some(b"1".to_vec()));
        assert_eq!(cf.get(b"b", 0).unwrap(), Some(b"2".to_vec()));
    }
}
