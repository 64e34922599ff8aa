//! Metadata cache
//!
//! Bounded LRU map from pyramid name to metadata. Entries older than the TTL
//! are dropped when touched. The cache is an ordinary value owned by whoever
//! reads metadata; there is no process-wide instance.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::Result;

use super::PyramidMetadata;

struct CachedEntry {
    metadata: Arc<PyramidMetadata>,
    inserted_at: Instant,
}

/// LRU + TTL cache of pyramid metadata
pub struct MetadataCache {
    entries: Mutex<LruCache<String, CachedEntry>>,
    ttl: Duration,
}

impl MetadataCache {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Cached metadata for `pyramid`, if present and fresh
    ///
    /// Marks the entry as recently used; evicts it if expired.
    pub fn get(&self, pyramid: &str) -> Option<Arc<PyramidMetadata>> {
        let mut entries = self.entries.lock();

        let expired = match entries.get(pyramid) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(Arc::clone(&entry.metadata));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(pyramid);
            tracing::debug!(pyramid, "Metadata cache entry expired");
        }
        None
    }

    /// Store metadata, evicting the least recently used entry when full
    pub fn insert(&self, pyramid: impl Into<String>, metadata: PyramidMetadata) -> Arc<PyramidMetadata> {
        let metadata = Arc::new(metadata);
        self.entries.lock().put(
            pyramid.into(),
            CachedEntry {
                metadata: Arc::clone(&metadata),
                inserted_at: Instant::now(),
            },
        );
        metadata
    }

    /// Drop the entry for `pyramid`
    pub fn invalidate(&self, pyramid: &str) {
        self.entries.lock().pop(pyramid);
    }

    /// Cached metadata, or the result of `load` (which is then cached)
    ///
    /// The lock is not held while `load` runs. Load errors are returned and
    /// nothing is cached.
    pub fn get_or_load<F>(&self, pyramid: &str, load: F) -> Result<Arc<PyramidMetadata>>
    where
        F: FnOnce() -> Result<PyramidMetadata>,
    {
        if let Some(hit) = self.get(pyramid) {
            return Ok(hit);
        }

        let metadata = load()?;
        Ok(self.insert(pyramid, metadata))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
