//! In-process embedding cache, content-hash keyed (spec §2, §5 "Shared
//! state": "an in-process LRU keyed by content hash; concurrent accesses
//! are safe and last-writer-wins").

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

pub type ContentHash = u64;

pub fn hash_content(text: &str) -> ContentHash {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Thread-safe LRU cache from content hash to embedding vector.
pub struct EmbeddingCache {
    inner: Mutex<LruCache<ContentHash, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity must be nonzero");
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = hash_content(text);
        self.inner.lock().expect("cache lock poisoned").get(&key).cloned()
    }

    pub fn put(&self, text: &str, embedding: Vec<f32>) {
        let key = hash_content(text);
        self.inner.lock().expect("cache lock poisoned").put(key, embedding);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().expect("cache lock poisoned").clear();
    }
}
