use rand::seq::SliceRandom;
use tempfile::tempdir;

use crate::btree::BTree;

#[test]
fn insert_search_roundtrip() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("idx.db"), 4).unwrap();
    tree.insert(b"a", 1).unwrap();
    tree.insert(b"b", 2).unwrap();
    tree.insert(b"c", 3).unwrap();
    assert_eq!(tree.search(b"a").unwrap(), Some(1));
    assert_eq!(tree.search(b"b").unwrap(), Some(2));
    assert_eq!(tree.search(b"missing").unwrap(), None);
}

#[test]
fn duplicate_insert_is_rejected() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("idx.db"), 4).unwrap();
    tree.insert(b"a", 1).unwrap();
    let err = tree.insert(b"a", 2).unwrap_err();
    assert!(matches!(err, crate::btree::BTreeError::DuplicateKey));
    assert_eq!(tree.search(b"a").unwrap(), Some(1));
}

#[test]
fn alphabet_with_small_order_produces_correct_range_and_search() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("idx.db"), 4).unwrap();
    for (i, c) in (b'a'..=b'z').enumerate() {
        tree.insert(&[c], i as u32 + 1).unwrap();
    }
    assert_eq!(tree.search(b"m").unwrap(), Some(13));
    assert_eq!(
        tree.range_query(b"c", b"f").unwrap(),
        vec![3, 4, 5, 6]
    );
    assert_eq!(tree.range_query(b"a", b"z").unwrap().len(), 26);
}

#[test]
fn range_query_is_empty_when_no_keys_match() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("idx.db"), 4).unwrap();
    tree.insert(b"a", 1).unwrap();
    tree.insert(b"z", 2).unwrap();
    assert_eq!(tree.range_query(b"m", b"n").unwrap(), Vec::<u32>::new());
}

#[test]
fn reopening_an_existing_index_preserves_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idx.db");
    {
        let mut tree = BTree::open(&path, 4).unwrap();
        for i in 0..50u32 {
            tree.insert(format!("k{i:03}").as_bytes(), i).unwrap();
        }
    }
    let mut tree = BTree::open(&path, 4).unwrap();
    assert_eq!(tree.search(b"k000").unwrap(), Some(0));
    assert_eq!(tree.search(b"k049").unwrap(), Some(49));
    assert_eq!(tree.range_query(b"k000", b"k999").unwrap().len(), 50);
}

#[test]
fn random_insertion_order_still_yields_correct_search_and_range() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("idx.db"), 5).unwrap();

    let mut keys: Vec<u32> = (0..800).collect();
    keys.shuffle(&mut rand::rng());

    for k in &keys {
        tree.insert(format!("k{k:05}").as_bytes(), *k).unwrap();
    }
    for k in &keys {
        assert_eq!(tree.search(format!("k{k:05}").as_bytes()).unwrap(), Some(*k));
    }
    assert_eq!(
        tree.range_query(b"k00000", b"k99999").unwrap().len(),
        keys.len()
    );
}

#[test]
fn many_insertions_keep_tree_height_reasonable() {
    let dir = tempdir().unwrap();
    let mut tree = BTree::open(dir.path().join("idx.db"), 100).unwrap();
    for i in 0..5000u32 {
        tree.insert(format!("key{i:06}").as_bytes(), i).unwrap();
    }
    assert_eq!(tree.search(b"key000000").unwrap(), Some(0));
    assert_eq!(tree.search(b"key004999").unwrap(), Some(4999));
    assert_eq!(
        tree.range_query(b"key000000", b"key999999").unwrap().len(),
        5000
    );
}
