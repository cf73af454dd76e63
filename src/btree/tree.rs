//! Top-level B+ tree driver: open, insert, search, range_query.

use std::path::Path;

use tracing::{debug, info};

use crate::btree::node::{child_index, is_overfull, InternalNode, LeafNode, Node};
use crate::btree::page::Metadata;
use crate::btree::pager::Pager;
use crate::btree::{BTreeError, Result};

/// Default tree order when the caller doesn't have a specific reason to
/// pick another.
pub const DEFAULT_ORDER: u32 = 100;

/// A disk-backed B+ tree index mapping byte-string keys to `u32` record
/// IDs.
///
/// Not thread-safe: concurrent callers must serialize access externally.
pub struct BTree {
    pager: Pager,
    meta: Metadata,
}

impl BTree {
    /// Open the index file at `path`, creating it with an empty root leaf
    /// if it doesn't exist.
    pub fn open(path: impl AsRef<Path>, order: u32) -> Result<Self> {
        let (mut pager, existed) = Pager::open(path)?;
        let meta = if existed {
            let meta = pager.read_metadata()?;
            info!(order = meta.order, root = meta.root_page_id, "opened existing b+ tree index");
            meta
        } else {
            let mut meta = Metadata {
                order,
                root_page_id: 1,
                free_pages: Vec::new(),
            };
            pager.write_metadata(&meta)?;
            let root = Node::Leaf(LeafNode {
                page_id: 1,
                keys: Vec::new(),
                values: Vec::new(),
                next_page_id: 0,
            });
            pager.write_page(&root)?;
            pager.sync()?;
            meta.root_page_id = 1;
            info!(order, "created new b+ tree index");
            meta
        };
        Ok(BTree { pager, meta })
    }

    /// Insert `key -> value`. Returns [`BTreeError::DuplicateKey`] if
    /// `key` is already present; the tree is left unchanged in that case.
    pub fn insert(&mut self, key: &[u8], value: u32) -> Result<()> {
        let mut path = Vec::new();
        let mut current_id = self.meta.root_page_id;
        loop {
            let node = self.pager.get_page(current_id)?;
            match node {
                Node::Leaf(mut leaf) => {
                    if leaf.find(key).is_ok() {
                        return Err(BTreeError::DuplicateKey);
                    }
                    leaf.insert_sorted(key.to_vec(), value);
                    self.pager.write_page(&Node::Leaf(leaf.clone()))?;
                    if is_overfull(&Node::Leaf(leaf.clone()), self.meta.order) {
                        self.split_leaf_and_propagate(leaf, path)?;
                    }
                    self.pager.sync()?;
                    return Ok(());
                }
                Node::Internal(internal) => {
                    let idx = child_index(&internal.keys, key);
                    let next_id = internal.children[idx];
                    path.push(internal.page_id);
                    current_id = next_id;
                }
            }
        }
    }

    /// Point lookup.
    pub fn search(&mut self, key: &[u8]) -> Result<Option<u32>> {
        let mut current_id = self.meta.root_page_id;
        loop {
            match self.pager.get_page(current_id)? {
                Node::Leaf(leaf) => {
                    return Ok(leaf.find(key).ok().map(|i| leaf.values[i]));
                }
                Node::Internal(internal) => {
                    let idx = child_index(&internal.keys, key);
                    current_id = internal.children[idx];
                }
            }
        }
    }

    /// Ordered range scan over `[lo, hi]`.
    pub fn range_query(&mut self, lo: &[u8], hi: &[u8]) -> Result<Vec<u32>> {
        let mut results = Vec::new();
        let mut current_id = self.meta.root_page_id;
        // Descend to the leaf that would contain `lo`.
        let mut leaf = loop {
            match self.pager.get_page(current_id)? {
                Node::Leaf(leaf) => break leaf,
                Node::Internal(internal) => {
                    let idx = child_index(&internal.keys, lo);
                    current_id = internal.children[idx];
                }
            }
        };
        'outer: loop {
            for (key, value) in leaf.keys.iter().zip(leaf.values.iter()) {
                if key.as_slice() < lo {
                    continue;
                }
                if key.as_slice() > hi {
                    break 'outer;
                }
                results.push(*value);
            }
            if leaf.next_page_id == 0 {
                break;
            }
            match self.pager.get_page(leaf.next_page_id)? {
                Node::Leaf(next) => leaf = next,
                Node::Internal(_) => {
                    return Err(BTreeError::Internal(
                        "leaf next_page_id pointed at an internal page".to_string(),
                    ))
                }
            }
        }
        Ok(results)
    }

    /// Split an overfull leaf and propagate the promoted key up `path`
    /// (root-to-parent, in descent order), splitting ancestors as needed
    /// and growing the tree's height when the root itself splits.
    fn split_leaf_and_propagate(&mut self, mut leaf: LeafNode, path: Vec<u32>) -> Result<()> {
        let new_page_id = self.pager.allocate_page(&mut self.meta)?;
        let (new_leaf, promoted_key) = leaf.split(new_page_id);
        self.pager.write_page(&Node::Leaf(leaf))?;
        self.pager.write_page(&Node::Leaf(new_leaf))?;
        self.pager.write_metadata(&self.meta)?;
        self.propagate_split(path, promoted_key, new_page_id)
    }

    /// Insert `(separator, right_child)` into the last page on `path`
    /// (the immediate parent), splitting further up as needed.
    fn propagate_split(
        &mut self,
        mut path: Vec<u32>,
        separator: Vec<u8>,
        right_child: u32,
    ) -> Result<()> {
        let Some(parent_id) = path.pop() else {
            // The node that split was the root: grow the tree by one level.
            let new_root_id = self.pager.allocate_page(&mut self.meta)?;
            let old_root_id = self.meta.root_page_id;
            let new_root = InternalNode {
                page_id: new_root_id,
                keys: vec![separator],
                children: vec![old_root_id, right_child],
            };
            self.pager.write_page(&Node::Internal(new_root))?;
            self.meta.root_page_id = new_root_id;
            self.pager.write_metadata(&self.meta)?;
            debug!(new_root_id, "grew tree height by one level");
            return Ok(());
        };

        let mut parent = match self.pager.get_page(parent_id)? {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => {
                return Err(BTreeError::Internal(
                    "split propagation path pointed at a leaf".to_string(),
                ))
            }
        };
        parent.insert_separator(separator, right_child);
        if is_overfull(&Node::Internal(parent.clone()), self.meta.order) {
            let new_page_id = self.pager.allocate_page(&mut self.meta)?;
            let (new_internal, promoted_key) = parent.split(new_page_id);
            self.pager.write_page(&Node::Internal(parent))?;
            self.pager.write_page(&Node::Internal(new_internal))?;
            self.pager.write_metadata(&self.meta)?;
            self.propagate_split(path, promoted_key, new_page_id)
        } else {
            self.pager.write_page(&Node::Internal(parent))?;
            Ok(())
        }
    }
}
