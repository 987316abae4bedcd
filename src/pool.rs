use crate::config::Compression;
use crate::date::ShardKey;
use crate::paths::shard_path;
use crate::writer::ShardWriter;
use ahash::{AHashSet, RandomState};
use anyhow::{anyhow, Result};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Handle-pool activity over one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Shard files opened for the first time in this run.
    pub created: u64,
    /// Opens of a shard that was evicted earlier in this run.
    pub reopened: u64,
    pub evicted: u64,
    pub peak_open: usize,
}

/// At most `capacity` open shard writers, evicted least-recently-used first.
///
/// Files are always opened in append mode, so a key can be evicted and
/// revisited any number of times without losing or reordering its records.
/// Eviction flushes and closes the victim before the new file is opened.
pub struct ShardHandlePool {
    writers: LruCache<ShardKey, ShardWriter, RandomState>,
    capacity: NonZeroUsize,
    prefix: PathBuf,
    compression: Compression,
    write_buf_bytes: usize,
    seen: AHashSet<ShardKey>,
    stats: PoolStats,
}

impl ShardHandlePool {
    pub fn new(prefix: &Path, capacity: usize, compression: Compression, write_buf_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            writers: LruCache::with_hasher(capacity, RandomState::new()),
            capacity,
            prefix: prefix.to_path_buf(),
            compression,
            write_buf_bytes,
            seen: AHashSet::new(),
            stats: PoolStats::default(),
        }
    }

    pub fn shard_path(&self, key: ShardKey) -> PathBuf {
        shard_path(&self.prefix, key, self.compression)
    }

    /// Writer for `key`, opening (and evicting the LRU writer) if needed.
    pub fn acquire(&mut self, key: ShardKey) -> Result<&mut ShardWriter> {
        if !self.writers.contains(&key) {
            if self.writers.len() >= self.capacity.get() {
                self.evict_lru()?;
            }
            let path = self.shard_path(key);
            let writer = ShardWriter::open(key, &path, self.compression, self.write_buf_bytes)?;
            if self.seen.insert(key) {
                self.stats.created += 1;
            } else {
                self.stats.reopened += 1;
                tracing::debug!(shard = %key, "reopened shard for append");
            }
            self.writers.put(key, writer);
            self.stats.peak_open = self.stats.peak_open.max(self.writers.len());
        }
        self.writers
            .get_mut(&key)
            .ok_or_else(|| anyhow!("shard {key} missing from handle pool"))
    }

    fn evict_lru(&mut self) -> Result<()> {
        if let Some((key, mut w)) = self.writers.pop_lru() {
            self.stats.evicted += 1;
            tracing::debug!(shard = %key, written = w.written(), "evicting shard writer");
            w.finish()?;
        }
        Ok(())
    }

    /// Flush and close every live writer. Every writer is attempted even if
    /// one fails; the first error is returned. Idempotent.
    pub fn release_all(&mut self) -> Result<()> {
        let mut first_err = None;
        while let Some((key, mut w)) = self.writers.pop_lru() {
            if let Err(e) = w.finish() {
                tracing::warn!(shard = %key, "failed to close shard: {e:#}");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn open_count(&self) -> usize {
        self.writers.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Distinct shard keys opened so far.
    pub fn shard_count(&self) -> usize {
        self.seen.len()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl Drop for ShardHandlePool {
    fn drop(&mut self) {
        if self.writers.is_empty() {
            return;
        }
        if let Err(e) = self.release_all() {
            tracing::error!("shard writers not cleanly closed: {e:#}");
        }
    }
}
