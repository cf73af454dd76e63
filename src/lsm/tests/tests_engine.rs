use tempfile::tempdir;

use crate::lsm::{LsmConfig, LsmTree};

#[test]
fn set_get_and_range_query_basic() {
    let dir = tempdir().unwrap();
    let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
    store.set(b"a".to_vec(), b"1".to_vec()).unwrap();
    store.set(b"b".to_vec(), b"2".to_vec()).unwrap();
    store.set(b"c".to_vec(), b"3".to_vec()).unwrap();
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    let mut range = store.range_query(b"a", b"c").unwrap();
    range.sort();
    assert_eq!(
        range,
        vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ]
    );
}

#[test]
fn overwrite_and_delete_semantics() {
    let dir = tempdir().unwrap();
    let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
    store.set(b"k".to_vec(), b"v1".to_vec()).unwrap();
    store.set(b"k".to_vec(), b"v2".to_vec()).unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));
    store.delete(b"k".to_vec()).unwrap();
    assert_eq!(store.get(b"k").unwrap(), None);
}

#[test]
fn many_writes_trigger_at_least_one_flush() {
    let dir = tempdir().unwrap();
    let config = LsmConfig {
        max_memtable_size: 100,
        ..LsmConfig::default()
    };
    let store = LsmTree::open(dir.path(), config).unwrap();
    for i in 0..1500u32 {
        store.set(format!("k{i}").into_bytes(), i.to_le_bytes().to_vec()).unwrap();
    }
    assert_eq!(store.get(b"k0").unwrap(), Some(0u32.to_le_bytes().to_vec()));
    assert_eq!(
        store.get(b"k1499").unwrap(),
        Some(1499u32.to_le_bytes().to_vec())
    );
    let sstable_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("sstable_"))
        .collect();
    assert!(!sstable_files.is_empty());
}

#[test]
fn enough_sstables_trigger_compaction() {
    let dir = tempdir().unwrap();
    let config = LsmConfig {
        max_memtable_size: 1000,
        max_sstables: 5,
    };
    let store = LsmTree::open(dir.path(), config).unwrap();
    for i in 0..6000u32 {
        store.set(format!("k{i:05}").into_bytes(), i.to_le_bytes().to_vec()).unwrap();
    }
    let compacted = dir.path().join("sstable_compacted.db");
    assert!(compacted.exists());

    let numbered_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with("sstable_") && name != "sstable_compacted.db"
        })
        .collect();
    assert!(numbered_files.is_empty());

    assert_eq!(store.get(b"k00000").unwrap(), Some(0u32.to_le_bytes().to_vec()));
    assert_eq!(
        store.get(b"k05999").unwrap(),
        Some(5999u32.to_le_bytes().to_vec())
    );
}

#[test]
fn newest_wins_across_memtable_and_sstable_generations() {
    let dir = tempdir().unwrap();
    let config = LsmConfig {
        max_memtable_size: 1,
        max_sstables: 100,
    };
    let store = LsmTree::open(dir.path(), config).unwrap();
    store.set(b"k".to_vec(), b"older".to_vec()).unwrap(); // flushes immediately (size 1)
    store.set(b"k".to_vec(), b"newer".to_vec()).unwrap(); // flushes again
    store.set(b"other".to_vec(), b"x".to_vec()).unwrap(); // lives in the memtable
    assert_eq!(store.get(b"k").unwrap(), Some(b"newer".to_vec()));
}

#[test]
fn recovery_without_close_replays_the_wal() {
    let dir = tempdir().unwrap();
    {
        let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
        store.set(b"a".to_vec(), b"1".to_vec()).unwrap();
        store.set(b"b".to_vec(), b"2".to_vec()).unwrap();
        // Simulate a crash: no close().
    }
    let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn close_then_reopen_is_durable() {
    let dir = tempdir().unwrap();
    {
        let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
        store.set(b"a".to_vec(), b"1".to_vec()).unwrap();
        store.delete(b"a".to_vec()).unwrap();
        store.set(b"b".to_vec(), b"2".to_vec()).unwrap();
        store.close().unwrap();
    }
    let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
    assert_eq!(store.get(b"a").unwrap(), None);
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn opening_a_path_that_is_a_plain_file_is_rejected() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("not_a_dir");
    std::fs::write(&file_path, b"oops").unwrap();
    let err = LsmTree::open(&file_path, LsmConfig::default()).unwrap_err();
    assert!(matches!(err, crate::lsm::LsmError::InvalidArgument(_)));
}
