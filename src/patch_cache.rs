//! LRU cache for commit patches. A commit's patch never changes, so entries
//! keyed by hash stay valid until evicted.

use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;

/// Thread-safe LRU cache of `git show` output keyed by commit hash.
pub struct PatchCache {
    cache: RwLock<LruCache<String, String>>,
}

impl PatchCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, hash: &str) -> Option<String> {
        self.cache.write().get(hash).cloned()
    }

    pub fn insert(&self, hash: String, patch: String) {
        self.cache.write().put(hash, patch);
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }
}
