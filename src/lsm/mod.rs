//! Log-structured merge-tree key/value store.
//!
//! Writes land in a bounded in-memory [`memtable::MemTable`], journaled
//! first through [`wal::WalStore`] for crash durability. A full memtable
//! flushes to an immutable [`sstable::SSTable`]; once too many SSTables
//! accumulate, [`engine::LsmTree`] compacts them into one. Reads merge the
//! memtable and SSTables newest-first.

pub mod engine;
pub mod memtable;
pub mod reentrant_mutex;
pub mod sstable;
pub mod wal;

#[cfg(test)]
mod tests;

pub use engine::{LsmConfig, LsmTree};
pub use wal::WalStore;

use thiserror::Error;

use crate::encoding::{Decode, Encode, EncodingError};

/// A value stored for a key, or a marker that the key was deleted.
///
/// Kept distinct from `Option<Vec<u8>>` at every internal layer so a live
/// empty-byte-string value is never confused with a deletion; only the
/// outermost [`LsmTree::get`] collapses both "deleted" and "absent" to
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Value(Vec<u8>),
    Tombstone,
}

const ENTRY_TAG_TOMBSTONE: u8 = 0;
const ENTRY_TAG_VALUE: u8 = 1;

impl Encode for Entry {
    fn encode_to(&self, buf: &mut Vec<u8>) -> std::result::Result<(), EncodingError> {
        match self {
            Entry::Tombstone => ENTRY_TAG_TOMBSTONE.encode_to(buf),
            Entry::Value(value) => {
                ENTRY_TAG_VALUE.encode_to(buf)?;
                value.encode_to(buf)
            }
        }
    }
}

impl Decode for Entry {
    fn decode_from(buf: &[u8]) -> std::result::Result<(Self, usize), EncodingError> {
        let (tag, mut offset) = u8::decode_from(buf)?;
        match tag {
            ENTRY_TAG_TOMBSTONE => Ok((Entry::Tombstone, offset)),
            ENTRY_TAG_VALUE => {
                let (value, consumed) = Vec::<u8>::decode_from(&buf[offset..])?;
                offset += consumed;
                Ok((Entry::Value(value), offset))
            }
            other => Err(EncodingError::InvalidTag {
                tag: other as u32,
                type_name: "lsm::Entry",
            }),
        }
    }
}

/// Errors produced by the LSM store.
#[derive(Debug, Error)]
pub enum LsmError {
    /// The base path conflicts with something already on disk, or a
    /// caller-supplied argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O failure reading or writing store files.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure in the write-ahead log or its checkpoint/recovery path.
    #[error("wal error: {0}")]
    Wal(#[from] wal::WalError),

    /// Failure reading or writing an SSTable.
    #[error("sstable error: {0}")]
    SSTable(#[from] sstable::SSTableError),

    /// Compaction could not complete; prior SSTables are left intact.
    #[error("compaction failed: {0}")]
    CompactionFailed(String),
}

pub type Result<T> = std::result::Result<T, LsmError>;
