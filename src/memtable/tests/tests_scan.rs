#[cfg(test)]
mod tests {
    use crate::memtable::Memtable;

    fn populate(memtable: &Memtable) {
        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")] {
            memtable.put(k.as_bytes().to_vec(), v.as_bytes().to_vec(), 0).unwrap();
        }
    }

    #[test]
    fn scan_returns_keys_in_range_ascending() {
        let memtable = Memtable::new();
        populate(&memtable);

        let results = memtable.scan(b"b", b"d").unwrap();
        let keys: Vec<_> = results.iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn scan_includes_tombstones() {
        let memtable = Memtable::new();
        populate(&memtable);
        memtable.delete(b"b".to_vec()).unwrap();

        let results = memtable.scan(b"a", b"d").unwrap();
        let deleted = results.iter().find(|r| r.key == b"b").unwrap();
        assert!(deleted.value.is_tombstone());
    }

    #[test]
    fn scan_with_empty_range_returns_nothing() {
        let memtable = Memtable::new();
        populate(&memtable);

        assert!(memtable.scan(b"z", b"a").unwrap().is_empty());
        assert!(memtable.scan(b"a", b"a").unwrap().is_empty());
    }

    #[test]
    fn iter_returns_every_record_in_key_order() {
        let memtable = Memtable::new();
        populate(&memtable);

        let all = memtable.iter().unwrap();
        let keys: Vec<_> = all.iter().map(|r| r.key.clone()).collect();
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }
}
