//! Pool Contract Module
//!
//! The item pool contract shared by every backend, plus the optional
//! expired-item sweep capability.

use indexmap::IndexMap;

use crate::cache::key::validate_keys;
use crate::cache::CacheItem;
use crate::error::Result;

// == Cache Pool ==
/// Keyed collection of cache items with immediate and deferred persistence.
///
/// Methods that take a key reject malformed keys with
/// [`CacheError::InvalidArgument`](crate::error::CacheError) before touching
/// the backend. Backend failures are never raised: mutating methods report
/// them by returning `false`.
///
/// Pools are not internally synchronized; share one behind a lock if it has
/// to be used from several threads.
pub trait CachePool {
    /// Returns the item for `key`, or a fresh miss item.
    ///
    /// A pending deferred write for the key is returned as queued. A stored
    /// item that is expired or unreadable is deleted and replaced by a fresh
    /// miss item carrying the pool's default TTL.
    fn get_item(&mut self, key: &str) -> Result<CacheItem>;

    /// Returns one item per requested key, in request order.
    fn get_items(&mut self, keys: &[&str]) -> Result<IndexMap<String, CacheItem>> {
        validate_keys(keys.iter().copied())?;

        let mut items = IndexMap::with_capacity(keys.len());
        for key in keys {
            let item = self.get_item(key)?;
            items.insert((*key).to_string(), item);
        }

        Ok(items)
    }

    /// Confirms the pool holds a live item for `key`.
    ///
    /// Another writer may delete the key right after this returns true. Code
    /// that goes on to read the value should fetch the item once and use
    /// [`CacheItem::get`] instead.
    fn has_item(&mut self, key: &str) -> Result<bool> {
        Ok(self.get_item(key)?.is_hit())
    }

    /// Removes every item, pending or persisted.
    fn clear(&mut self) -> bool;

    /// Removes an item. Deleting an absent key succeeds.
    fn delete_item(&mut self, key: &str) -> Result<bool>;

    /// Removes several items, attempting every key even after a failure.
    fn delete_items(&mut self, keys: &[&str]) -> Result<bool> {
        validate_keys(keys.iter().copied())?;

        let mut success = true;
        for key in keys {
            success = self.delete_item(key)? && success;
        }

        Ok(success)
    }

    /// Persists an item immediately and marks it as a hit.
    ///
    /// On failure the item is left as a miss and false is returned.
    fn save(&mut self, item: &mut CacheItem) -> bool;

    /// Queues an item for the next [`commit`](CachePool::commit).
    fn save_deferred(&mut self, item: CacheItem) -> bool;

    /// Persists queued items. Items that fail stay queued for a later retry.
    ///
    /// Returns true when nothing is left in the queue.
    fn commit(&mut self) -> bool;

    /// Returns the expired-item sweep capability, if the backend has one.
    fn expired_items_sweeper(&mut self) -> Option<&mut dyn DeleteExpiredItems> {
        None
    }
}

// == Delete Expired Items ==
/// Optional capability: proactively remove expired items from storage.
pub trait DeleteExpiredItems {
    /// Removes every stored item that is no longer a hit.
    ///
    /// Items without an expiration are never touched. A failed deletion does
    /// not stop the sweep; it only makes the result false.
    fn delete_expired_items(&mut self) -> bool;
}

impl<P: CachePool + ?Sized> CachePool for Box<P> {
    fn get_item(&mut self, key: &str) -> Result<CacheItem> {
        (**self).get_item(key)
    }

    fn get_items(&mut self, keys: &[&str]) -> Result<IndexMap<String, CacheItem>> {
        (**self).get_items(keys)
    }

    fn has_item(&mut self, key: &str) -> Result<bool> {
        (**self).has_item(key)
    }

    fn clear(&mut self) -> bool {
        (**self).clear()
    }

    fn delete_item(&mut self, key: &str) -> Result<bool> {
        (**self).delete_item(key)
    }

    fn delete_items(&mut self, keys: &[&str]) -> Result<bool> {
        (**self).delete_items(keys)
    }

    fn save(&mut self, item: &mut CacheItem) -> bool {
        (**self).save(item)
    }

    fn save_deferred(&mut self, item: CacheItem) -> bool {
        (**self).save_deferred(item)
    }

    fn commit(&mut self) -> bool {
        (**self).commit()
    }

    fn expired_items_sweeper(&mut self) -> Option<&mut dyn DeleteExpiredItems> {
        (**self).expired_items_sweeper()
    }
}
