//! Immutable, sorted on-disk table.
//!
//! Layout: an 8-byte big-endian `index_offset` header, a data region of
//! `[record_len: u32 BE][key, entry]` records (the tuple itself encoded
//! with [`crate::encoding`]), then at `index_offset` a `[count: u32 BE]`
//! followed by `count` `[key, offset: u64 BE]` pairs. The outer framing
//! (lengths, offsets, counts) is big-endian per the on-disk format this
//! engine commits to; only the key/value payloads inside each record and
//! index entry use this crate's little-endian [`crate::encoding`] format.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::encoding::{Decode, Encode, EncodingError};
use crate::lsm::Entry;

/// Errors produced reading or writing an SSTable.
#[derive(Debug, Error)]
pub enum SSTableError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

pub type Result<T> = std::result::Result<T, SSTableError>;

/// A single immutable sorted table, with its key -> byte-offset index
/// held in memory.
pub struct SSTable {
    path: PathBuf,
    index: BTreeMap<Vec<u8>, u64>,
}

impl SSTable {
    /// Write `entries` to `path` atomically (temp file, fsync, rename),
    /// then open the result.
    pub fn write(path: impl AsRef<Path>, entries: &BTreeMap<Vec<u8>, Entry>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = path.with_extension("db.tmp");
        let mut index = BTreeMap::new();

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&0u64.to_be_bytes())?;
            let mut offset: u64 = 8;

            for (key, entry) in entries {
                let mut record = Vec::new();
                key.encode_to(&mut record)?;
                entry.encode_to(&mut record)?;
                let record_len = u32::try_from(record.len())
                    .map_err(|_| SSTableError::Format("record exceeds u32::MAX bytes".to_string()))?;

                index.insert(key.clone(), offset);
                file.write_all(&record_len.to_be_bytes())?;
                file.write_all(&record)?;
                offset += 4 + record.len() as u64;
            }

            let index_offset = offset;
            let mut index_buf = Vec::new();
            let count = u32::try_from(index.len())
                .map_err(|_| SSTableError::Format("index exceeds u32::MAX entries".to_string()))?;
            index_buf.extend_from_slice(&count.to_be_bytes());
            for (key, off) in &index {
                key.encode_to(&mut index_buf)?;
                index_buf.extend_from_slice(&off.to_be_bytes());
            }
            file.write_all(&index_buf)?;
            file.flush()?;
            file.sync_all()?;

            file.seek(SeekFrom::Start(0))?;
            file.write_all(&index_offset.to_be_bytes())?;
            file.flush()?;
            file.sync_all()?;
        }

        std::fs::rename(&tmp_path, &path)?;
        info!(path = %path.display(), entries = index.len(), "wrote sstable");
        Ok(SSTable { path, index })
    }

    /// Open an existing SSTable file, loading its index into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let index_offset = u64::from_be_bytes(header);

        file.seek(SeekFrom::Start(index_offset))?;
        let mut rest = Vec::new();
        file.read_to_end(&mut rest)?;
        let index = decode_index(&rest)?;

        Ok(SSTable { path, index })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Entry>> {
        let Some(&offset) = self.index.get(key) else {
            return Ok(None);
        };
        let (_key, entry) = self.read_record_at(offset)?;
        Ok(Some(entry))
    }

    /// Entries with `lo <= k <= hi`, ascending, including tombstones —
    /// callers decide visibility.
    pub fn range_scan(&self, lo: &[u8], hi: &[u8]) -> Result<Vec<(Vec<u8>, Entry)>> {
        if lo > hi {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        for (key, &offset) in self.index.range(lo.to_vec()..=hi.to_vec()) {
            let (_key, entry) = self.read_record_at(offset)?;
            results.push((key.clone(), entry));
        }
        Ok(results)
    }

    /// Every entry in the table, ascending, including tombstones. Used by
    /// compaction, which must see the whole key space rather than a
    /// truncated subrange.
    pub fn full_scan(&self) -> Result<Vec<(Vec<u8>, Entry)>> {
        let mut results = Vec::with_capacity(self.index.len());
        for (key, &offset) in &self.index {
            let (_key, entry) = self.read_record_at(offset)?;
            results.push((key.clone(), entry));
        }
        Ok(results)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn read_record_at(&self, offset: u64) -> Result<(Vec<u8>, Entry)> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut record = vec![0u8; len];
        file.read_exact(&mut record)?;
        let (key, consumed) = Vec::<u8>::decode_from(&record)?;
        let (entry, _) = Entry::decode_from(&record[consumed..])?;
        Ok((key, entry))
    }
}

fn decode_index(buf: &[u8]) -> Result<BTreeMap<Vec<u8>, u64>> {
    if buf.len() < 4 {
        return Err(SSTableError::Format("truncated sstable index".to_string()));
    }
    let count = match buf[0..4].try_into() {
        Ok(bytes) => u32::from_be_bytes(bytes),
        Err(_) => return Err(SSTableError::Format("truncated sstable index".to_string())),
    };
    let mut offset = 4usize;
    let mut index = BTreeMap::new();
    for _ in 0..count {
        let (key, consumed) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += consumed;
        if buf.len() < offset + 8 {
            return Err(SSTableError::Format("truncated sstable index".to_string()));
        }
        let off = match buf[offset..offset + 8].try_into() {
            Ok(bytes) => u64::from_be_bytes(bytes),
            Err(_) => return Err(SSTableError::Format("truncated sstable index".to_string())),
        };
        offset += 8;
        index.insert(key, off);
    }
    Ok(index)
}
