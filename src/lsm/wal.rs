//! Write-ahead log and snapshot checkpoint controller.
//!
//! Durability is two files: `wal.log`, a line-oriented JSON journal
//! appended and fsync'd on every write, and `data.db`, a checkpointed
//! binary snapshot of the same state written atomically via temp-file
//! rename. Recovery loads the snapshot, then replays the WAL tail.
//!
//! The WAL line format is JSON (via `serde`/`serde_json`) rather than this
//! crate's own binary [`crate::encoding`] format, so a log can be
//! inspected by hand during an incident. Keys and values are stored as
//! base64 text within each JSON line: the public API accepts arbitrary
//! byte strings, which JSON strings cannot hold verbatim.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::encoding::{Decode, Encode, EncodingError};
use crate::lsm::Entry;

const WAL_FILE_NAME: &str = "wal.log";
const SNAPSHOT_FILE_NAME: &str = "data.db";

/// Errors produced by the WAL/snapshot controller.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed wal entry: {0}")]
    Malformed(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

pub type Result<T> = std::result::Result<T, WalError>;

#[derive(Debug, Serialize, Deserialize)]
struct WalLine {
    timestamp: String,
    operation: String,
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

/// Owns the WAL file and the in-memory state it (plus the last snapshot)
/// reconstructs.
pub struct WalStore {
    wal_path: PathBuf,
    snapshot_path: PathBuf,
    wal_file: File,
    map: BTreeMap<Vec<u8>, Entry>,
}

impl WalStore {
    /// Open the WAL/snapshot pair under `dir`, recovering in-memory state
    /// by loading the snapshot (if any) and replaying the WAL tail.
    pub fn open(dir: &Path) -> Result<Self> {
        let wal_path = dir.join(WAL_FILE_NAME);
        let snapshot_path = dir.join(SNAPSHOT_FILE_NAME);

        let mut map = BTreeMap::new();
        if snapshot_path.exists() {
            let bytes = std::fs::read(&snapshot_path)?;
            map = decode_snapshot(&bytes)?;
            debug!(entries = map.len(), "loaded snapshot");
        }

        if wal_path.exists() {
            let file = File::open(&wal_path)?;
            let reader = BufReader::new(file);
            let mut replayed = 0usize;
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let parsed: WalLine = serde_json::from_str(&line).map_err(|e| {
                    WalError::Malformed(format!("wal line {}: {e}", lineno + 1))
                })?;
                apply_line(&mut map, &parsed)?;
                replayed += 1;
            }
            if replayed > 0 {
                info!(replayed, "replayed wal tail");
            }
        }

        let wal_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&wal_path)?;

        Ok(WalStore {
            wal_path,
            snapshot_path,
            wal_file,
            map,
        })
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.append_line("set", &key, Some(&value))?;
        self.map.insert(key, Entry::Value(value));
        Ok(())
    }

    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.append_line("delete", &key, None)?;
        self.map.insert(key, Entry::Tombstone);
        Ok(())
    }

    /// The reconstructed in-memory state: snapshot plus replayed WAL tail.
    pub fn snapshot(&self) -> &BTreeMap<Vec<u8>, Entry> {
        &self.map
    }

    /// Atomically persist `map` to `data.db`, then truncate the WAL.
    ///
    /// Ordering matters: the rename must land before the truncate, so a
    /// crash between the two steps still leaves a recoverable state (the
    /// WAL tail would simply be replayed again against the new snapshot,
    /// which is idempotent for set/delete).
    pub fn checkpoint(&mut self) -> Result<()> {
        let bytes = encode_snapshot(&self.map)?;
        let tmp_path = self.snapshot_path.with_extension("db.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.snapshot_path)?;

        self.wal_file.set_len(0)?;
        self.wal_file.seek(SeekFrom::Start(0))?;
        self.wal_file.sync_all()?;
        debug!(entries = self.map.len(), "checkpointed wal");
        Ok(())
    }

    fn append_line(&mut self, operation: &str, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        let line = WalLine {
            timestamp: diagnostic_timestamp(),
            operation: operation.to_string(),
            key: base64_encode(key),
            value: value.map(base64_encode),
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');
        self.wal_file.write_all(json.as_bytes())?;
        self.wal_file.flush()?;
        self.wal_file.sync_all()?;
        Ok(())
    }
}

fn apply_line(map: &mut BTreeMap<Vec<u8>, Entry>, line: &WalLine) -> Result<()> {
    let key = base64_decode(&line.key)?;
    match line.operation.as_str() {
        "set" => {
            let value = line
                .value
                .as_deref()
                .ok_or_else(|| WalError::Malformed("set entry missing value".to_string()))?;
            let value = base64_decode(value)?;
            map.insert(key, Entry::Value(value));
        }
        "delete" => {
            map.insert(key, Entry::Tombstone);
        }
        other => {
            warn!(operation = other, "skipping unknown wal operation");
            return Err(WalError::Malformed(format!("unknown operation {other}")));
        }
    }
    Ok(())
}

fn encode_snapshot(map: &BTreeMap<Vec<u8>, Entry>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let count = u32::try_from(map.len())
        .map_err(|_| WalError::Malformed("snapshot has more than u32::MAX entries".to_string()))?;
    count.encode_to(&mut buf)?;
    for (key, entry) in map {
        key.encode_to(&mut buf)?;
        entry.encode_to(&mut buf)?;
    }
    Ok(buf)
}

fn decode_snapshot(bytes: &[u8]) -> Result<BTreeMap<Vec<u8>, Entry>> {
    let (count, mut offset) = u32::decode_from(bytes)?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let (key, consumed) = Vec::<u8>::decode_from(&bytes[offset..])?;
        offset += consumed;
        let (entry, consumed) = Entry::decode_from(&bytes[offset..])?;
        offset += consumed;
        map.insert(key, entry);
    }
    Ok(map)
}

/// Seconds (and sub-second fraction) since the Unix epoch. The WAL's
/// `timestamp` field is diagnostic only, so this avoids pulling in a
/// calendar/date-time dependency for a field nothing parses back.
fn diagnostic_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:09}", now.as_secs(), now.subsec_nanos())
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        let n = (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);
        out.push(BASE64_ALPHABET[((n >> 18) & 0x3F) as usize] as char);
        out.push(BASE64_ALPHABET[((n >> 12) & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 {
            BASE64_ALPHABET[((n >> 6) & 0x3F) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            BASE64_ALPHABET[(n & 0x3F) as usize] as char
        } else {
            '='
        });
    }
    out
}

fn base64_decode(s: &str) -> Result<Vec<u8>> {
    fn value_of(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some(u32::from(c - b'A')),
            b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
            b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let bytes = s.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(WalError::Malformed(
            "base64 length is not a multiple of 4".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for chunk in bytes.chunks(4) {
        let pad = chunk.iter().filter(|&&c| c == b'=').count();
        let mut n = 0u32;
        for &c in chunk {
            n <<= 6;
            if c == b'=' {
                continue;
            }
            n |= value_of(c)
                .ok_or_else(|| WalError::Malformed("invalid base64 byte".to_string()))?;
        }
        out.push((n >> 16) as u8);
        if pad < 2 {
            out.push((n >> 8) as u8);
        }
        if pad < 1 {
            out.push(n as u8);
        }
    }
    Ok(out)
}
