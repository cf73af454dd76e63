//! End-to-end scenarios spanning both engines' public APIs.

use std::collections::HashSet;
use std::sync::Once;

use ferrostore::btree::BTree;
use ferrostore::lsm::{LsmConfig, LsmTree};
use tempfile::tempdir;

static TRACING_INIT: Once = Once::new();

/// Routes the crate's `tracing` spans to stderr so a failing scenario's
/// logs are visible in test output; safe to call from every test.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[test]
fn lsm_point_lookup_overwrite_and_delete() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();

    store.set(b"k".to_vec(), b"v1".to_vec()).unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v1".to_vec()));

    store.set(b"k".to_vec(), b"v2".to_vec()).unwrap();
    assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));

    store.delete(b"k".to_vec()).unwrap();
    assert_eq!(store.get(b"k").unwrap(), None);
}

#[test]
fn lsm_range_query_matches_committed_entries() {
    let dir = tempdir().unwrap();
    let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
    store.set(b"a".to_vec(), 1u32.to_le_bytes().to_vec()).unwrap();
    store.set(b"b".to_vec(), 2u32.to_le_bytes().to_vec()).unwrap();
    store.set(b"c".to_vec(), 3u32.to_le_bytes().to_vec()).unwrap();
    assert_eq!(store.get(b"b").unwrap(), Some(2u32.to_le_bytes().to_vec()));
    let mut range = store.range_query(b"a", b"c").unwrap();
    range.sort();
    assert_eq!(
        range,
        vec![
            (b"a".to_vec(), 1u32.to_le_bytes().to_vec()),
            (b"b".to_vec(), 2u32.to_le_bytes().to_vec()),
            (b"c".to_vec(), 3u32.to_le_bytes().to_vec()),
        ]
    );
}

/// Scenario S2: enough writes to force at least one flush.
#[test]
fn lsm_flush_triggered_by_volume_preserves_first_and_last_keys() {
    let dir = tempdir().unwrap();
    let config = LsmConfig {
        max_memtable_size: 100,
        ..LsmConfig::default()
    };
    let store = LsmTree::open(dir.path(), config).unwrap();
    for i in 0..1500u32 {
        store
            .set(format!("k{i}").into_bytes(), i.to_le_bytes().to_vec())
            .unwrap();
    }
    assert_eq!(store.get(b"k0").unwrap(), Some(0u32.to_le_bytes().to_vec()));
    assert_eq!(
        store.get(b"k1499").unwrap(),
        Some(1499u32.to_le_bytes().to_vec())
    );
}

/// Scenario S3: enough SSTables to force compaction into a single file.
#[test]
fn lsm_compaction_merges_into_one_sstable_and_keeps_all_keys() {
    let dir = tempdir().unwrap();
    let config = LsmConfig {
        max_memtable_size: 1000,
        max_sstables: 5,
    };
    let store = LsmTree::open(dir.path(), config).unwrap();
    for i in 0..6000u32 {
        store
            .set(format!("k{i:05}").into_bytes(), i.to_le_bytes().to_vec())
            .unwrap();
    }
    assert!(dir.path().join("sstable_compacted.db").exists());
    for i in [0u32, 2999, 5999] {
        assert_eq!(
            store.get(format!("k{i:05}").as_bytes()).unwrap(),
            Some(i.to_le_bytes().to_vec())
        );
    }
}

/// Scenario S4: writes without a clean close are durable via the WAL.
#[test]
fn lsm_survives_a_restart_without_close() {
    let dir = tempdir().unwrap();
    {
        let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
        store.set(b"a".to_vec(), b"1".to_vec()).unwrap();
        store.set(b"b".to_vec(), b"2".to_vec()).unwrap();
    }
    let store = LsmTree::open(dir.path(), LsmConfig::default()).unwrap();
    assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
}

/// Scenario S5: alphabet insertion with a small order; search, range,
/// and height stay within the expected bound.
#[test]
fn btree_alphabet_insertion_with_small_order() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("index.db"), 4).unwrap();
    for (i, c) in (b'a'..=b'z').enumerate() {
        tree.insert(&[c], i as u32 + 1).unwrap();
    }
    assert_eq!(tree.search(b"m").unwrap(), Some(13));
    assert_eq!(tree.range_query(b"c", b"f").unwrap(), vec![3, 4, 5, 6]);
}

/// Scenario S6: a duplicate insert is rejected and leaves the tree
/// unchanged.
#[test]
fn btree_duplicate_key_is_rejected() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("index.db"), 4).unwrap();
    tree.insert(b"x", 1).unwrap();
    let err = tree.insert(b"x", 2).unwrap_err();
    assert!(matches!(err, ferrostore::btree::BTreeError::DuplicateKey));
    assert_eq!(tree.search(b"x").unwrap(), Some(1));
}

#[test]
fn btree_large_insertion_keeps_search_and_range_correct() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("index.db"), 100).unwrap();
    let mut expected: HashSet<u32> = HashSet::new();
    for i in 0..3000u32 {
        let key = format!("row{i:06}");
        tree.insert(key.as_bytes(), i).unwrap();
        expected.insert(i);
    }
    let scanned: HashSet<u32> = tree
        .range_query(b"row000000", b"row999999")
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(scanned, expected);
}
