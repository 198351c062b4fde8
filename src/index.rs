//! Access-ordered key index.
//!
//! Thin wrapper around [`lru::LruCache`] keeping entries in access order:
//! lookups and inserts move the key to the most-recently-used position, and
//! the least-recently-used end supplies eviction victims. Capacity is
//! unbounded here; the cache enforces its byte budget itself.

use lru::LruCache;

use crate::entry::Entry;

/// Access-ordered mapping from key to [`Entry`].
pub(crate) struct LruIndex {
    entries: LruCache<String, Entry>,
}

impl LruIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up an entry and promote it to most-recently-used.
    pub fn promote(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.get_mut(key)
    }

    /// Look up an entry without disturbing the access order.
    pub fn peek(&self, key: &str) -> Option<&Entry> {
        self.entries.peek(key)
    }

    /// Mutable lookup without disturbing the access order.
    pub fn peek_mut(&mut self, key: &str) -> Option<&mut Entry> {
        self.entries.peek_mut(key)
    }

    /// Look up an entry, inserting a fresh one if absent. Promotes either way.
    pub fn get_or_insert(&mut self, key: &str, value_count: usize) -> &mut Entry {
        if !self.entries.contains(key) {
            self.entries.put(key.to_string(), Entry::new(value_count));
        }
        self.entries.get_mut(key).expect("entry just inserted")
    }

    /// Insert an entry at the most-recently-used position.
    pub fn insert(&mut self, key: String, entry: Entry) {
        self.entries.put(key, entry);
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.entries.pop(key)
    }

    /// Keys ordered least-recently-used first.
    ///
    /// Snapshots the order, so callers may mutate the index while walking.
    pub fn keys_lru_first(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|(key, _)| key.clone()).collect();
        keys.reverse();
        keys
    }
}
