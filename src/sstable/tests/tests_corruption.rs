#[cfg(test)]
mod tests {
    use std::fs::{self, OpenOptions};
    use std::io::{Seek, SeekFrom, Write};

    use tempfile::TempDir;

    use crate::record::KeyValueRecord;
    use crate::sstable::{SSTable, SSTableError, SstableBuilder};

    #[test]
    fn open_rejects_truncated_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sstable.sst");
        let records = vec![KeyValueRecord::live(b"a".to_vec(), b"1".to_vec(), 0)];
        SstableBuilder::build(&path, &records, 0.01).unwrap();

        let full = fs::read(&path).unwrap();
        fs::write(&path, &full[..5]).unwrap();

        let err = SSTable::open(&path, 1).unwrap_err();
        assert!(matches!(err, SSTableError::Corrupt(_)));
    }

    #[test]
    fn open_rejects_corrupted_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sstable.sst");
        let records = vec![KeyValueRecord::live(b"a".to_vec(), b"1".to_vec(), 0)];
        SstableBuilder::build(&path, &records, 0.01).unwrap();

        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(b"XXXX").unwrap();
        file.sync_all().unwrap();

        let err = SSTable::open(&path, 1).unwrap_err();
        assert!(matches!(
            err,
            SSTableError::ChecksumMismatch(_) | SSTableError::Corrupt(_)
        ));
    }

    #[test]
    fn open_rejects_corrupted_record_block() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sstable.sst");
        let records = vec![KeyValueRecord::live(b"a".to_vec(), b"1".to_vec(), 0)];
        SstableBuilder::build(&path, &records, 0.01).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let sstable = SSTable::open(&path, 1).unwrap();
        let err = sstable.get(b"a", 0).unwrap_err();
        assert!(matches!(err, SSTableError::ChecksumMismatch(_)));
    }
}
