//! Directory cache for decoded directory blocks.
//!
//! Each archive session owns one cache. Entries are keyed by the byte range
//! the directory was read from and evicted least-recently-used first once the
//! number of cached directories exceeds the capacity.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::format::DirectoryEntry;
use crate::io::ByteRange;

/// Default number of directories kept per archive.
///
/// Leaf directories are a few kilobytes decoded, so this bounds memory per
/// archive without refetching hot directories.
pub const MAX_DIRECTORY_CACHE_ENTRIES: usize = 100;

/// Location of a directory inside its archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectoryKey {
    pub offset: u64,
    pub length: u64,
}

impl From<ByteRange> for DirectoryKey {
    fn from(range: ByteRange) -> Self {
        Self {
            offset: range.offset,
            length: range.length,
        }
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// LRU cache of decoded directories with a fixed entry cap.
///
/// Lookups promote the entry to most-recently-used in O(1). Cached entry
/// lists are shared with callers and never mutated.
pub struct DirectoryCache {
    entries: LruCache<DirectoryKey, Arc<[DirectoryEntry]>>,
    stats: DirectoryCacheStats,
}

impl DirectoryCache {
    /// Create a cache holding [`MAX_DIRECTORY_CACHE_ENTRIES`] directories.
    pub fn new() -> Self {
        Self::with_capacity(MAX_DIRECTORY_CACHE_ENTRIES)
    }

    /// Create a cache holding at most `capacity` directories (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            stats: DirectoryCacheStats::default(),
        }
    }

    /// Look up a directory and mark it most-recently-used.
    pub fn get(&mut self, key: &DirectoryKey) -> Option<Arc<[DirectoryEntry]>> {
        match self.entries.get(key) {
            Some(entries) => {
                self.stats.hits += 1;
                Some(Arc::clone(entries))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Count a miss that was observed without [`get`](Self::get).
    pub fn record_miss(&mut self) {
        self.stats.misses += 1;
    }

    /// Check for a directory without touching recency or counters.
    pub fn contains(&self, key: &DirectoryKey) -> bool {
        self.entries.contains(key)
    }

    /// Insert a decoded directory as most-recently-used.
    ///
    /// Returns the shared entries and the key evicted to make room, if any.
    pub fn insert(
        &mut self,
        key: DirectoryKey,
        entries: Vec<DirectoryEntry>,
    ) -> (Arc<[DirectoryEntry]>, Option<DirectoryKey>) {
        let entries: Arc<[DirectoryEntry]> = entries.into();
        let evicted = match self.entries.push(key, Arc::clone(&entries)) {
            // `push` also hands back the old value when the key was already present
            Some((old_key, _)) if old_key != key => {
                self.stats.evictions += 1;
                Some(old_key)
            }
            _ => None,
        };
        (entries, evicted)
    }

    /// Keys from least- to most-recently-used.
    pub fn keys_by_recency(&self) -> Vec<DirectoryKey> {
        self.entries.iter().rev().map(|(k, _)| *k).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn stats(&self) -> DirectoryCacheStats {
        self.stats
    }
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new()
    }
}
