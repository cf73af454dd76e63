//! Fixed 4 KiB page codec.
//!
//! Every page is exactly [`PAGE_SIZE`] bytes. Page 0 is [`Metadata`]; every
//! other page is a [`Node`](crate::btree::node::Node), encoded by
//! [`encode_page`] and decoded by [`decode_page`].

use crate::btree::node::{InternalNode, LeafNode, Node};
use crate::btree::BTreeError;
use crate::encoding::{Decode, Encode};

/// Fixed page size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Magic number identifying a valid index file, stored at the start of
/// page 0.
pub const METADATA_MAGIC: u32 = 0x1357_9BDF;

const LEAF_TAG: u8 = 1;
const INTERNAL_TAG: u8 = 0;

/// Page 0: tree-wide metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub order: u32,
    pub root_page_id: u32,
    pub free_pages: Vec<u32>,
}

impl Metadata {
    pub fn encode(&self) -> Result<[u8; PAGE_SIZE], BTreeError> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        METADATA_MAGIC.encode_to(&mut buf)?;
        self.order.encode_to(&mut buf)?;
        (self.root_page_id as u64).encode_to(&mut buf)?;
        let free_count = u32::try_from(self.free_pages.len()).map_err(|_| {
            BTreeError::Internal("free page list exceeds u32::MAX entries".to_string())
        })?;
        free_count.encode_to(&mut buf)?;
        for id in &self.free_pages {
            id.encode_to(&mut buf)?;
        }
        if buf.len() > PAGE_SIZE {
            return Err(BTreeError::PageOverflow {
                encoded: buf.len(),
                page_size: PAGE_SIZE,
            });
        }
        buf.resize(PAGE_SIZE, 0);
        let mut page = [0u8; PAGE_SIZE];
        page.copy_from_slice(&buf);
        Ok(page)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, BTreeError> {
        let (magic, mut offset) =
            u32::decode_from(buf).map_err(|e| BTreeError::Format(e.to_string()))?;
        if magic != METADATA_MAGIC {
            return Err(BTreeError::Format(format!(
                "bad metadata magic: expected {METADATA_MAGIC:#x}, found {magic:#x}"
            )));
        }
        let (order, consumed) =
            u32::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
        offset += consumed;
        let (root_page_id, consumed) =
            u64::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
        offset += consumed;
        let (free_count, consumed) =
            u32::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
        offset += consumed;
        let mut free_pages = Vec::with_capacity(free_count as usize);
        for _ in 0..free_count {
            let (id, consumed) =
                u32::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
            offset += consumed;
            free_pages.push(id);
        }
        let root_page_id = u32::try_from(root_page_id)
            .map_err(|_| BTreeError::Format("root page id exceeds u32::MAX".to_string()))?;
        Ok(Metadata {
            order,
            root_page_id,
            free_pages,
        })
    }
}

/// Encode a node to exactly [`PAGE_SIZE`] bytes.
pub fn encode_page(node: &Node) -> Result<[u8; PAGE_SIZE], BTreeError> {
    let mut buf = Vec::with_capacity(PAGE_SIZE);
    match node {
        Node::Leaf(leaf) => {
            LEAF_TAG.encode_to(&mut buf)?;
            let key_count = u16::try_from(leaf.keys.len())
                .map_err(|_| BTreeError::Internal("leaf key count exceeds u16::MAX".to_string()))?;
            key_count.encode_to(&mut buf)?;
            leaf.next_page_id.encode_to(&mut buf)?;
            for (key, value) in leaf.keys.iter().zip(leaf.values.iter()) {
                encode_key(key, &mut buf)?;
                value.encode_to(&mut buf)?;
            }
        }
        Node::Internal(internal) => {
            INTERNAL_TAG.encode_to(&mut buf)?;
            let key_count = u16::try_from(internal.keys.len()).map_err(|_| {
                BTreeError::Internal("internal key count exceeds u16::MAX".to_string())
            })?;
            key_count.encode_to(&mut buf)?;
            0u32.encode_to(&mut buf)?; // next_page_id unused for internal nodes
            for (key, child) in internal.keys.iter().zip(internal.children.iter()) {
                encode_key(key, &mut buf)?;
                child.encode_to(&mut buf)?;
            }
            let last_child = internal.children.last().ok_or_else(|| {
                BTreeError::Internal("internal node has no children".to_string())
            })?;
            last_child.encode_to(&mut buf)?;
        }
    }
    if buf.len() > PAGE_SIZE {
        return Err(BTreeError::PageOverflow {
            encoded: buf.len(),
            page_size: PAGE_SIZE,
        });
    }
    buf.resize(PAGE_SIZE, 0);
    let mut page = [0u8; PAGE_SIZE];
    page.copy_from_slice(&buf);
    Ok(page)
}

/// Decode a page previously produced by [`encode_page`].
pub fn decode_page(page_id: u32, buf: &[u8]) -> Result<Node, BTreeError> {
    if buf.len() != PAGE_SIZE {
        return Err(BTreeError::Format(format!(
            "page buffer is {} bytes, expected {PAGE_SIZE}",
            buf.len()
        )));
    }
    let (tag, mut offset) =
        u8::decode_from(buf).map_err(|e| BTreeError::Format(e.to_string()))?;
    let (key_count, consumed) =
        u16::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
    offset += consumed;
    let (next_page_id, consumed) =
        u32::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
    offset += consumed;

    match tag {
        LEAF_TAG => {
            let mut keys = Vec::with_capacity(key_count as usize);
            let mut values = Vec::with_capacity(key_count as usize);
            for _ in 0..key_count {
                let (key, consumed) = decode_key(&buf[offset..])?;
                offset += consumed;
                let (value, consumed) =
                    u32::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
                offset += consumed;
                keys.push(key);
                values.push(value);
            }
            Ok(Node::Leaf(LeafNode {
                page_id,
                keys,
                values,
                next_page_id,
            }))
        }
        INTERNAL_TAG => {
            let mut keys = Vec::with_capacity(key_count as usize);
            let mut children = Vec::with_capacity(key_count as usize + 1);
            for _ in 0..key_count {
                let (key, consumed) = decode_key(&buf[offset..])?;
                offset += consumed;
                let (child, consumed) =
                    u32::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
                offset += consumed;
                keys.push(key);
                children.push(child);
            }
            let (last_child, _) =
                u32::decode_from(&buf[offset..]).map_err(|e| BTreeError::Format(e.to_string()))?;
            children.push(last_child);
            Ok(Node::Internal(InternalNode {
                page_id,
                keys,
                children,
            }))
        }
        other => Err(BTreeError::Format(format!("bad page tag: {other}"))),
    }
}

fn encode_key(key: &[u8], buf: &mut Vec<u8>) -> Result<(), BTreeError> {
    let len = u16::try_from(key.len())
        .map_err(|_| BTreeError::Internal("key exceeds u16::MAX bytes".to_string()))?;
    len.encode_to(buf)?;
    buf.extend_from_slice(key);
    Ok(())
}

fn decode_key(buf: &[u8]) -> Result<(Vec<u8>, usize), BTreeError> {
    let (len, mut offset) =
        u16::decode_from(buf).map_err(|e| BTreeError::Format(e.to_string()))?;
    let len = len as usize;
    if buf.len() < offset + len {
        return Err(BTreeError::Format("truncated key in page".to_string()));
    }
    let key = buf[offset..offset + len].to_vec();
    offset += len;
    Ok((key, offset))
}
