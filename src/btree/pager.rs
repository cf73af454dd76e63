//! Page-granularity reads and writes over the index file.
//!
//! No caching layer is required or provided — page-sized I/O at these
//! data volumes is simple and cheap enough that a cache would only add
//! invalidation hazards for no measurable benefit.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::btree::node::Node;
use crate::btree::page::{decode_page, encode_page, Metadata, PAGE_SIZE};
use crate::btree::{BTreeError, Result};

/// Owns the index file handle and performs page-addressed I/O.
pub struct Pager {
    file: File,
}

impl Pager {
    /// Open (creating if absent) the index file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref();
        let existed = path.exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        debug!(path = %path.display(), existed, "opened b+ tree index file");
        Ok((Pager { file }, existed))
    }

    /// Number of pages currently allocated in the file (including page 0).
    pub fn page_count(&mut self) -> Result<u64> {
        let len = self.file.seek(SeekFrom::End(0))?;
        Ok(len / PAGE_SIZE as u64)
    }

    pub fn read_metadata(&mut self) -> Result<Metadata> {
        let buf = self.read_raw(0)?;
        Metadata::decode(&buf)
    }

    pub fn write_metadata(&mut self, meta: &Metadata) -> Result<()> {
        let encoded = meta.encode()?;
        self.write_raw(0, &encoded)
    }

    pub fn get_page(&mut self, page_id: u32) -> Result<Node> {
        trace!(page_id, "reading page");
        let buf = self.read_raw(page_id as u64)?;
        decode_page(page_id, &buf)
    }

    pub fn write_page(&mut self, node: &Node) -> Result<()> {
        let encoded = encode_page(node)?;
        trace!(page_id = node.page_id(), "writing page");
        self.write_raw(node.page_id() as u64, &encoded)
    }

    /// Allocate a fresh page ID, preferring the metadata free list and
    /// otherwise extending the file by one page.
    pub fn allocate_page(&mut self, meta: &mut Metadata) -> Result<u32> {
        if let Some(id) = meta.free_pages.pop() {
            debug!(page_id = id, "reused free page");
            return Ok(id);
        }
        let next_id = self.page_count()?;
        let next_id = u32::try_from(next_id)
            .map_err(|_| BTreeError::Internal("index file exceeds u32::MAX pages".to_string()))?;
        debug!(page_id = next_id, "allocated new page");
        Ok(next_id)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn read_raw(&mut self, page_id: u64) -> Result<[u8; PAGE_SIZE]> {
        let mut buf = [0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(page_id * PAGE_SIZE as u64))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_raw(&mut self, page_id: u64, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id * PAGE_SIZE as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}
