//! Memory Pool Module
//!
//! Process-local pool backed by a HashMap. Expired entries are dropped
//! lazily when read; there is no sweep capability.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cache::key::validate_key;
use crate::cache::{CacheItem, CachePool, DeferredQueue, Ttl};
use crate::clock::SharedClock;
use crate::error::Result;

// == Memory Pool ==
/// In-memory cache item pool.
#[derive(Debug)]
pub struct MemoryPool {
    /// Authoritative items
    items: HashMap<String, CacheItem>,
    /// Writes waiting for commit
    deferred: DeferredQueue,
    clock: SharedClock,
    /// Default TTL applied to fresh items, None = forever
    ttl: Option<Ttl>,
}

impl MemoryPool {
    // == Constructor ==
    /// Creates an empty pool.
    ///
    /// # Arguments
    /// * `clock` - Time source for expiry checks
    /// * `ttl` - Default TTL for fresh items (None = never expires)
    pub fn new(clock: SharedClock, ttl: Option<Ttl>) -> Self {
        Self {
            items: HashMap::new(),
            deferred: DeferredQueue::new(),
            clock,
            ttl,
        }
    }

    /// Flushes deferred writes and disposes of the pool.
    ///
    /// Returns the outcome of the final commit. Writes that still fail are
    /// discarded.
    pub fn close(mut self) -> bool {
        let committed = self.commit();
        if !committed {
            warn!(
                "Memory pool closed with {} uncommitted items",
                self.deferred.len()
            );
            self.deferred.clear();
        }
        committed
    }

    // == Length ==
    /// Returns the number of persisted items, expired ones included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items waiting for commit.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    fn fresh_item(&self, key: &str) -> CacheItem {
        let mut item = CacheItem::new(key, self.clock.clone());
        item.expires_after(self.ttl);
        item
    }
}

impl CachePool for MemoryPool {
    fn get_item(&mut self, key: &str) -> Result<CacheItem> {
        validate_key(key)?;

        if let Some(item) = self.deferred.get(key) {
            return Ok(item.clone());
        }

        let Some(stored) = self.items.get(key) else {
            return Ok(self.fresh_item(key));
        };

        let mut item = stored.clone();
        item.set_clock(self.clock.clone());

        if item.is_hit() {
            return Ok(item);
        }

        debug!("Memory pool: dropping expired item {}", key);
        self.items.remove(key);
        Ok(self.fresh_item(key))
    }

    fn clear(&mut self) -> bool {
        self.items.clear();
        self.deferred.clear();
        true
    }

    fn delete_item(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        self.items.remove(key);
        self.deferred.remove(key);
        Ok(true)
    }

    fn save(&mut self, item: &mut CacheItem) -> bool {
        if validate_key(item.key()).is_err() {
            warn!("Memory pool: refusing to save item with invalid key {:?}", item.key());
            return false;
        }

        item.set_hit(true);
        self.items.insert(item.key().to_string(), item.clone());
        true
    }

    fn save_deferred(&mut self, item: CacheItem) -> bool {
        self.deferred.push(item);
        true
    }

    fn commit(&mut self) -> bool {
        let mut deferred = std::mem::take(&mut self.deferred);
        let committed = deferred.flush_with(|item| self.save(item));
        self.deferred = deferred;

        debug!(
            "Memory pool commit: {} items left pending",
            self.deferred.len()
        );
        committed
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        if !self.deferred.is_empty() && !self.commit() {
            warn!(
                "Memory pool dropped with {} uncommitted items",
                self.deferred.len()
            );
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Interval;
    use crate::clock::{Clock, FrozenClock};
    use crate::error::CacheError;
    use chrono::TimeDelta;
    use serde_json::json;
    use std::sync::Arc;

    fn pool_with(ttl: Option<Ttl>) -> (MemoryPool, Arc<FrozenClock>) {
        let clock = FrozenClock::default().shared();
        (MemoryPool::new(clock.clone(), ttl), clock)
    }

    fn pool() -> (MemoryPool, Arc<FrozenClock>) {
        pool_with(None)
    }

    #[test]
    fn test_get_item_miss() {
        let (mut pool, _) = pool();
        let item = pool.get_item("foo").unwrap();

        assert_eq!(item.key(), "foo");
        assert!(!item.is_hit());
        assert!(item.get().is_none());
    }

    #[test]
    fn test_get_items() {
        let (mut pool, _) = pool();
        let items = pool.get_items(&["foo", "bar"]).unwrap();

        let keys: Vec<_> = items.keys().cloned().collect();
        assert_eq!(keys, vec!["foo", "bar"]);
        assert_eq!(items["bar"].key(), "bar");
    }

    #[test]
    fn test_get_items_empty() {
        let (mut pool, _) = pool();
        assert!(pool.get_items(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let (mut pool, _) = pool();
        assert!(matches!(
            pool.get_item("foo:bar"),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(pool.has_item("").is_err());
        assert!(pool.delete_item("{x}").is_err());
        assert!(pool.get_items(&["ok", "not/ok"]).is_err());
    }

    #[test]
    fn test_save_and_get() {
        let (mut pool, _) = pool();
        let mut item = pool.get_item("foo").unwrap();
        item.set("value");
        assert!(!item.is_hit());

        assert!(pool.save(&mut item));
        assert!(item.is_hit());

        let fetched = pool.get_item("foo").unwrap();
        assert!(fetched.is_hit());
        assert_eq!(fetched.get(), Some(&json!("value")));
    }

    #[test]
    fn test_has_item() {
        let (mut pool, _) = pool();
        let mut item = pool.get_item("foo").unwrap();
        pool.save(&mut item);

        assert!(pool.has_item("foo").unwrap());
        assert!(!pool.has_item("bar").unwrap());
    }

    #[test]
    fn test_delete_item_is_idempotent() {
        let (mut pool, _) = pool();
        let mut item = pool.get_item("foo").unwrap();
        pool.save(&mut item);

        assert!(pool.delete_item("foo").unwrap());
        assert!(!pool.has_item("foo").unwrap());
        assert!(pool.delete_item("foo").unwrap());
        assert!(pool.delete_item("never-saved").unwrap());
    }

    #[test]
    fn test_delete_items() {
        let (mut pool, _) = pool();
        for key in ["a", "b", "c"] {
            let mut item = pool.get_item(key).unwrap();
            pool.save(&mut item);
        }

        assert!(pool.delete_items(&["a", "b", "missing"]).unwrap());
        assert!(!pool.has_item("a").unwrap());
        assert!(!pool.has_item("b").unwrap());
        assert!(pool.has_item("c").unwrap());
    }

    #[test]
    fn test_clear() {
        let (mut pool, _) = pool();
        let mut item = pool.get_item("foo").unwrap();
        pool.save(&mut item);
        let pending = pool.get_item("bar").unwrap();
        pool.save_deferred(pending);

        assert!(pool.clear());
        assert!(!pool.has_item("foo").unwrap());
        assert_eq!(pool.deferred_len(), 0);
        assert!(pool.commit());
        assert!(!pool.has_item("bar").unwrap());
    }

    #[test]
    fn test_save_deferred_and_commit() {
        let (mut pool, _) = pool();
        let mut item = pool.get_item("foo").unwrap();
        item.set("value");

        assert!(pool.save_deferred(item));
        assert!(!pool.has_item("foo").unwrap());

        // A pool sees its own pending writes
        let pending = pool.get_item("foo").unwrap();
        assert!(!pending.is_hit());

        assert!(pool.commit());
        assert_eq!(pool.deferred_len(), 0);
        let fetched = pool.get_item("foo").unwrap();
        assert!(fetched.is_hit());
        assert_eq!(fetched.get(), Some(&json!("value")));
    }

    #[test]
    fn test_delete_item_drops_pending_write() {
        let (mut pool, _) = pool();
        let pending = pool.get_item("foo").unwrap();
        pool.save_deferred(pending);

        assert!(pool.delete_item("foo").unwrap());
        assert!(pool.commit());
        assert!(!pool.has_item("foo").unwrap());
    }

    #[test]
    fn test_expires_after_seconds() {
        let (mut pool, clock) = pool();
        let mut item = pool.get_item("foo").unwrap();
        item.set("bar").expires_after(Ttl::Seconds(30));
        pool.save(&mut item);

        clock.advance_secs(29);
        assert!(pool.has_item("foo").unwrap());

        clock.advance_secs(2);
        assert!(!pool.has_item("foo").unwrap());
        assert!(pool.is_empty(), "expired item is dropped on read");
    }

    #[test]
    fn test_expires_after_interval() {
        let (mut pool, clock) = pool();
        let mut item = pool.get_item("foo").unwrap();
        item.expires_after(Ttl::from(Interval::delta(TimeDelta::seconds(30))));
        pool.save(&mut item);

        clock.advance_secs(29);
        assert!(pool.has_item("foo").unwrap());
        clock.advance_secs(2);
        assert!(!pool.has_item("foo").unwrap());
    }

    #[test]
    fn test_never_expiring_item() {
        let (mut pool, clock) = pool();
        let mut item = pool.get_item("foo").unwrap();
        item.expires_at(None);
        pool.save(&mut item);

        clock.advance(TimeDelta::days(365 * 100));
        assert!(pool.has_item("foo").unwrap());
    }

    #[test]
    fn test_default_ttl() {
        let (mut pool, clock) = pool_with(Some(Ttl::Seconds(30)));
        let fresh = pool.get_item("foo").unwrap();
        assert_eq!(fresh.expiration(), Some(clock.now() + TimeDelta::seconds(30)));

        let mut item = fresh;
        pool.save(&mut item);

        clock.advance_secs(29);
        assert!(pool.has_item("foo").unwrap());
        clock.advance_secs(2);
        assert!(!pool.has_item("foo").unwrap());
    }

    #[test]
    fn test_close_flushes_deferred() {
        let (mut pool, _) = pool();
        let pending = pool.get_item("foo").unwrap();
        pool.save_deferred(pending);
        assert_eq!(pool.deferred_len(), 1);
        assert!(pool.close());
    }
}
