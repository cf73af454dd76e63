//! Top-level LSM driver: write path, read-path merge, flush, compaction.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::lsm::memtable::MemTable;
use crate::lsm::reentrant_mutex::ReentrantMutex;
use crate::lsm::sstable::SSTable;
use crate::lsm::wal::WalStore;
use crate::lsm::{Entry, LsmError, Result};

/// Tunable knobs for an [`LsmTree`].
#[derive(Debug, Clone, Copy)]
pub struct LsmConfig {
    /// Memtable entry count that triggers a flush.
    pub max_memtable_size: usize,
    /// SSTable count that triggers compaction after a flush.
    pub max_sstables: usize,
}

impl Default for LsmConfig {
    fn default() -> Self {
        LsmConfig {
            max_memtable_size: 1000,
            max_sstables: 5,
        }
    }
}

struct Inner {
    base_path: PathBuf,
    config: LsmConfig,
    memtable: MemTable,
    wal: WalStore,
    /// Oldest first; reads scan in reverse for newest-wins precedence.
    sstables: Vec<SSTable>,
}

/// A log-structured merge-tree key/value store.
///
/// All operations — reads included — serialize on a single reentrant
/// lock, since `delete` shares the locked write path `set` uses.
pub struct LsmTree {
    inner: ReentrantMutex<Inner>,
}

impl LsmTree {
    /// Open (creating if absent) the store directory at `base_path`.
    pub fn open(base_path: impl AsRef<Path>, config: LsmConfig) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.exists() && !base_path.is_dir() {
            return Err(LsmError::InvalidArgument(format!(
                "{} exists and is not a directory",
                base_path.display()
            )));
        }
        std::fs::create_dir_all(&base_path)?;

        let wal = WalStore::open(&base_path)?;
        let memtable = MemTable::from_map(wal.snapshot().clone(), config.max_memtable_size);

        let mut sstables = Vec::new();
        for path in discover_sstable_paths(&base_path)? {
            sstables.push(SSTable::open(path)?);
        }

        info!(
            path = %base_path.display(),
            sstables = sstables.len(),
            memtable_entries = memtable.len(),
            "opened lsm store"
        );

        Ok(LsmTree {
            inner: ReentrantMutex::new(Inner {
                base_path,
                config,
                memtable,
                wal,
                sstables,
            }),
        })
    }

    pub fn set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.inner.lock().set(key, value)
    }

    pub fn delete(&self, key: Vec<u8>) -> Result<()> {
        self.inner.lock().delete(key)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.lock().get(key)
    }

    pub fn range_query(&self, lo: &[u8], hi: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.lock().range_query(lo, hi)
    }

    /// Flush a non-empty memtable and checkpoint the WAL.
    pub fn close(&self) -> Result<()> {
        self.inner.lock().close()
    }
}

impl Inner {
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.wal.set(key.clone(), value.clone())?;
        self.memtable.put(key, value);
        if self.memtable.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    /// Journals the delete, then mutates the memtable directly rather
    /// than re-entering `set` — the lock is already held by this thread
    /// (reentrantly) either way, but this keeps the write path a single
    /// journal-then-apply step instead of two.
    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.wal.delete(key.clone())?;
        self.memtable.delete(key);
        if self.memtable.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(match entry {
                Entry::Value(value) => Some(value.clone()),
                Entry::Tombstone => None,
            });
        }
        for sstable in self.sstables.iter().rev() {
            if let Some(entry) = sstable.get(key)? {
                return Ok(match entry {
                    Entry::Value(value) => Some(value),
                    Entry::Tombstone => None,
                });
            }
        }
        Ok(None)
    }

    fn range_query(&self, lo: &[u8], hi: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut results = Vec::new();

        for (key, entry) in self.memtable.range_scan_with_tombstones(lo, hi) {
            seen.insert(key.clone());
            if let Entry::Value(value) = entry {
                results.push((key, value));
            }
        }

        for sstable in self.sstables.iter().rev() {
            for (key, entry) in sstable.range_scan(lo, hi)? {
                if !seen.insert(key.clone()) {
                    continue;
                }
                if let Entry::Value(value) = entry {
                    results.push((key, value));
                }
            }
        }

        Ok(results)
    }

    fn flush(&mut self) -> Result<()> {
        let generation = self.sstables.len();
        let path = self.base_path.join(format!("sstable_{generation}.db"));
        let sstable = SSTable::write(&path, self.memtable.entries())?;
        debug!(generation, entries = sstable.len(), "flushed memtable");
        self.sstables.push(sstable);
        self.memtable = MemTable::new(self.config.max_memtable_size);
        self.wal.checkpoint()?;

        if self.sstables.len() > self.config.max_sstables {
            self.compact()?;
        }
        Ok(())
    }

    /// Merge every SSTable into one, oldest to newest so later writers
    /// win on key collision, over the full key range (not a truncated
    /// ASCII subset).
    fn compact(&mut self) -> Result<()> {
        let mut merged: BTreeMap<Vec<u8>, Entry> = BTreeMap::new();
        for sstable in &self.sstables {
            for (key, entry) in sstable.full_scan()? {
                merged.insert(key, entry);
            }
        }

        let path = self.base_path.join("sstable_compacted.db");
        let compacted = SSTable::write(&path, &merged).map_err(|e| {
            LsmError::CompactionFailed(format!("failed to write compacted sstable: {e}"))
        })?;

        let old_paths: Vec<PathBuf> = self
            .sstables
            .drain(..)
            .map(|s| s.path().to_path_buf())
            .collect();
        info!(
            inputs = old_paths.len(),
            entries = compacted.len(),
            "compacted sstables"
        );
        for old_path in old_paths {
            if old_path != compacted.path() {
                let _ = std::fs::remove_file(old_path);
            }
        }
        self.sstables.push(compacted);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.memtable.is_empty() {
            self.flush()?;
        } else {
            self.wal.checkpoint()?;
        }
        Ok(())
    }
}

/// List SSTable files under `base_path`, numbered generations ascending,
/// with a compacted table (if present) appended last.
fn discover_sstable_paths(base_path: &Path) -> Result<Vec<PathBuf>> {
    let mut numbered: Vec<(usize, PathBuf)> = Vec::new();
    let mut compacted: Option<PathBuf> = None;

    for entry in std::fs::read_dir(base_path)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == "sstable_compacted.db" {
            compacted = Some(path);
        } else if let Some(rest) = name
            .strip_prefix("sstable_")
            .and_then(|r| r.strip_suffix(".db"))
        {
            if let Ok(generation) = rest.parse::<usize>() {
                numbered.push((generation, path));
            }
        }
    }

    numbered.sort_by_key(|(generation, _)| *generation);
    let mut paths: Vec<PathBuf> = numbered.into_iter().map(|(_, path)| path).collect();
    if let Some(path) = compacted {
        paths.push(path);
    }
    Ok(paths)
}
