//! # ferrostore
//!
//! Two embeddable, persistent storage engines sharing one crate:
//!
//! - [`btree`] — a disk-backed **B+ tree index** mapping byte-string keys to
//!   `u32` record IDs, persisted as fixed 4 KiB pages in a single file.
//!   Supports insertion, point lookup, and ordered range scan.
//! - [`lsm`] — a **log-structured merge-tree** key/value store: a bounded
//!   in-memory memtable backed by a write-ahead log, flushed to immutable
//!   on-disk SSTables and compacted as their number grows.
//!
//! The two engines are independent and share no code path; they share only
//! this crate's conventions for errors, logging, serialization, and
//! crash-safe on-disk writes (temp file + fsync + atomic rename).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`btree`] | Paged B+ tree: page codec, pager, node splits, tree driver |
//! | [`lsm`] | Memtable, write-ahead log, SSTable, compaction, tree driver |
//! | [`encoding`] | Dependency-free binary `Encode`/`Decode` wire format used by both engines' on-disk structures |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrostore::lsm::{LsmTree, LsmConfig};
//!
//! let store = LsmTree::open("/tmp/ferrostore-demo", LsmConfig::default()).unwrap();
//!
//! store.set(b"hello".to_vec(), b"world".to_vec()).unwrap();
//! assert_eq!(store.get(b"hello").unwrap(), Some(b"world".to_vec()));
//!
//! store.delete(b"hello".to_vec()).unwrap();
//! assert_eq!(store.get(b"hello").unwrap(), None);
//!
//! store.close().unwrap();
//! ```
//!
//! ```rust,no_run
//! use ferrostore::btree::BTree;
//! use tempfile::tempdir;
//!
//! let dir = tempdir().unwrap();
//! let mut tree = BTree::open(dir.path().join("index.db"), 100).unwrap();
//!
//! tree.insert(b"a", 1).unwrap();
//! tree.insert(b"b", 2).unwrap();
//! assert_eq!(tree.search(b"a").unwrap(), Some(1));
//! assert_eq!(tree.range_query(b"a", b"b").unwrap(), vec![1, 2]);
//! ```

#![allow(dead_code)]

pub mod btree;
pub mod encoding;
pub mod lsm;
