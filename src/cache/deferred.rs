//! Deferred Queue Module
//!
//! Items queued by `save_deferred` waiting for the next commit.

use indexmap::IndexMap;

use crate::cache::CacheItem;

// == Deferred Queue ==
/// Pool-local queue of pending writes, keyed by item key.
///
/// Queuing the same key twice keeps the latest item in its original slot.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    items: IndexMap<String, CacheItem>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an item, replacing any pending write for the same key.
    pub fn push(&mut self, item: CacheItem) {
        self.items.insert(item.key().to_string(), item);
    }

    pub fn get(&self, key: &str) -> Option<&CacheItem> {
        self.items.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheItem> {
        self.items.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // == Flush ==
    /// Runs `save` over every queued item in insertion order.
    ///
    /// Items for which `save` returns false stay queued, in their original
    /// order, for the next attempt. Returns true when the queue ends empty.
    pub fn flush_with<F>(&mut self, mut save: F) -> bool
    where
        F: FnMut(&mut CacheItem) -> bool,
    {
        let pending = std::mem::take(&mut self.items);

        for (key, mut item) in pending {
            if !save(&mut item) {
                self.items.insert(key, item);
            }
        }

        self.items.is_empty()
    }
}
