//! Disk-backed B+ tree index.
//!
//! Keys are variable-length byte strings; values are `u32` record IDs.
//! The tree is persisted as fixed 4 KiB pages in a single file: page 0 is
//! metadata (magic, order, root page ID, free list), every other page is
//! either a leaf or an internal node (see [`page`]).
//!
//! Only insertion, point lookup, and ordered range scan are exposed on the
//! disk-backed [`BTree`]. Deletion and the accompanying redistribute/merge
//! rebalancing are implemented as free functions over the in-memory
//! [`node::Node`] representation in [`node`], and are not wired to a
//! disk-backed `delete` entry point — see that module's doc comment for why.

pub mod node;
pub mod page;
pub mod pager;
pub mod tree;

#[cfg(test)]
mod tests;

pub use node::{InternalNode, LeafNode, Node};
pub use page::PAGE_SIZE;
pub use tree::BTree;

use thiserror::Error;

/// Errors produced by the B+ tree index.
#[derive(Debug, Error)]
pub enum BTreeError {
    /// I/O failure reading or writing the index file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A primitive failed to encode or decode via the crate's wire format.
    #[error("encoding error: {0}")]
    Encoding(#[from] crate::encoding::EncodingError),

    /// The index file's magic number or layout did not match expectations.
    #[error("format error: {0}")]
    Format(String),

    /// An encoded node would not fit in a single 4096-byte page.
    #[error("page overflow: encoded node is {encoded} bytes, page size is {page_size}")]
    PageOverflow {
        /// Size the node encoded to.
        encoded: usize,
        /// The fixed page size (always [`PAGE_SIZE`]).
        page_size: usize,
    },

    /// The key being inserted already exists in the tree.
    #[error("duplicate key")]
    DuplicateKey,

    /// An internal invariant was violated (should never happen on a
    /// correctly-constructed tree).
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BTreeError>;
