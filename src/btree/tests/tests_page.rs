use crate::btree::node::{InternalNode, LeafNode, Node};
use crate::btree::page::{decode_page, encode_page, Metadata, PAGE_SIZE};

#[test]
fn leaf_page_roundtrips() {
    let node = Node::Leaf(LeafNode {
        page_id: 3,
        keys: vec![b"aa".to_vec(), b"bb".to_vec(), b"cc".to_vec()],
        values: vec![1, 2, 3],
        next_page_id: 7,
    });
    let encoded = encode_page(&node).unwrap();
    assert_eq!(encoded.len(), PAGE_SIZE);
    let decoded = decode_page(3, &encoded).unwrap();
    assert_eq!(decoded, node);
}

#[test]
fn internal_page_roundtrips() {
    let node = Node::Internal(InternalNode {
        page_id: 5,
        keys: vec![b"m".to_vec(), b"t".to_vec()],
        children: vec![1, 2, 3],
    });
    let encoded = encode_page(&node).unwrap();
    assert_eq!(encoded.len(), PAGE_SIZE);
    let decoded = decode_page(5, &encoded).unwrap();
    assert_eq!(decoded, node);
}

#[test]
fn empty_leaf_page_roundtrips() {
    let node = Node::Leaf(LeafNode {
        page_id: 1,
        keys: Vec::new(),
        values: Vec::new(),
        next_page_id: 0,
    });
    let encoded = encode_page(&node).unwrap();
    let decoded = decode_page(1, &encoded).unwrap();
    assert_eq!(decoded, node);
}

#[test]
fn metadata_page_roundtrips() {
    let meta = Metadata {
        order: 100,
        root_page_id: 42,
        free_pages: vec![9, 4, 2],
    };
    let encoded = meta.encode().unwrap();
    assert_eq!(encoded.len(), PAGE_SIZE);
    let decoded = Metadata::decode(&encoded).unwrap();
    assert_eq!(decoded, meta);
}

#[test]
fn metadata_rejects_bad_magic() {
    let mut buf = [0u8; PAGE_SIZE];
    buf[0..4].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
    let err = Metadata::decode(&buf).unwrap_err();
    assert!(matches!(err, crate::btree::BTreeError::Format(_)));
}

#[test]
fn page_overflow_is_detected() {
    // A single key that alone exceeds the page, once framed, must fail
    // rather than silently truncate.
    let huge_key = vec![b'x'; PAGE_SIZE + 10];
    let node = Node::Leaf(LeafNode {
        page_id: 1,
        keys: vec![huge_key],
        values: vec![1],
        next_page_id: 0,
    });
    let err = encode_page(&node).unwrap_err();
    assert!(matches!(err, crate::btree::BTreeError::PageOverflow { .. }));
}
