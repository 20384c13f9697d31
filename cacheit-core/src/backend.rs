//! Storage seam for cache entries.
//!
//! The engine only decides *what* to store under *which* key. Where entries
//! live is up to the host: anything implementing [`CacheBackend`] works.
//! [`MemoryBackend`] is the in-process default.

use dashmap::DashMap;

use crate::cache_entry::CacheEntry;

/// Key-value store for cache entries.
///
/// Implementations must be thread-safe. Deleting a missing key is a no-op.
pub trait CacheBackend<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry<V>>;

    /// Store an entry, replacing whatever was under its key.
    fn set(&self, entry: CacheEntry<V>);

    /// # Returns
    ///
    /// `true` if an entry was removed
    fn delete(&self, key: &str) -> bool;

    fn delete_all(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory backend on a sharded `DashMap`.
#[derive(Debug)]
pub struct MemoryBackend<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V> MemoryBackend<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl<V> Default for MemoryBackend<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> CacheBackend<V> for MemoryBackend<V> {
    fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, entry: CacheEntry<V>) {
        self.entries.insert(entry.key.clone(), entry);
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn delete_all(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::CacheMetadata;
    use std::time::Instant;

    #[test]
    fn test_last_writer_wins() {
        let backend = MemoryBackend::new();
        let now = Instant::now();
        backend.set(CacheEntry::new("k", CacheMetadata::new(), 1, now, 0));
        backend.set(CacheEntry::new("k", CacheMetadata::new(), 2, now, 0));

        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get("k").map(|e| e.value), Some(2));
    }

    #[test]
    fn test_keys_are_sorted() {
        let backend = MemoryBackend::new();
        let now = Instant::now();
        for key in ["render:b", "render:a", "render:c"] {
            backend.set(CacheEntry::new(key, CacheMetadata::new(), 0u8, now, 0));
        }
        assert_eq!(backend.keys(), vec!["render:a", "render:b", "render:c"]);
    }

    #[test]
    fn test_delete_missing_key_is_noop() {
        let backend: MemoryBackend<u8> = MemoryBackend::new();
        assert!(!backend.delete("absent"));
        assert!(backend.is_empty());
    }
}
