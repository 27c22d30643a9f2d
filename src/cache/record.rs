//! Record Pool Module
//!
//! Pool storing one record per key in a table shared between namespaces.

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::key::validate_key;
use crate::cache::{CacheItem, CachePool, DeferredQueue, DeleteExpiredItems, Ttl};
use crate::clock::SharedClock;
use crate::error::{CacheError, Result};
use crate::storage::{CacheRecord, RecordFilter, RecordStore};

/// Returns the record id for `key` within `namespace`.
pub fn record_id(namespace: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

// == Record Pool ==
/// Cache item pool on top of a [`RecordStore`].
///
/// Several pools can share one table as long as their namespaces differ.
/// Sweeping expired items is a single filtered delete.
#[derive(Debug)]
pub struct RecordPool<S: RecordStore> {
    store: S,
    namespace: String,
    deferred: DeferredQueue,
    clock: SharedClock,
    ttl: Option<Ttl>,
}

impl<S: RecordStore> RecordPool<S> {
    // == Constructor ==
    /// Creates a pool in `namespace`.
    ///
    /// # Errors
    /// `CacheError::Cache` if `namespace` is empty.
    pub fn new(
        store: S,
        namespace: impl Into<String>,
        clock: SharedClock,
        ttl: Option<Ttl>,
    ) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(CacheError::Cache("namespace must not be empty".to_string()));
        }

        Ok(Self {
            store,
            namespace,
            deferred: DeferredQueue::new(),
            clock,
            ttl,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Counts the records currently stored in this pool's namespace.
    pub fn stored_len(&self) -> Option<usize> {
        self.store
            .count(&RecordFilter::Namespace(self.namespace.clone()))
            .ok()
    }

    /// Flushes deferred writes and disposes of the pool.
    pub fn close(mut self) -> bool {
        let committed = self.commit();
        if !committed {
            warn!(
                "Record pool {} closed with {} uncommitted items",
                self.namespace,
                self.deferred.len()
            );
            self.deferred.clear();
        }
        committed
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

    fn remove_record(&self, id: &str) -> bool {
        match self.store.delete(id) {
            Ok(()) => true,
            Err(err) if err.is_not_found() => true,
            Err(err) => {
                warn!("Record pool: failed to delete {}: {}", id, err);
                false
            }
        }
    }

    fn to_record(&self, item: &CacheItem) -> Result<CacheRecord> {
        let data = serde_json::to_string(item).map_err(crate::error::StorageError::from)?;
        Ok(CacheRecord {
            id: record_id(&self.namespace, item.key()),
            data,
            expiration: item.expiration().map(|at| at.timestamp_millis()),
            namespace: self.namespace.clone(),
        })
    }
}

impl<S: RecordStore> CachePool for RecordPool<S> {
    fn get_item(&mut self, key: &str) -> Result<CacheItem> {
        validate_key(key)?;

        if let Some(item) = self.deferred.get(key) {
            return Ok(item.clone());
        }

        let id = record_id(&self.namespace, key);
        let record = match self.store.find(&id) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(self.fresh_item(key)),
            Err(err) => {
                warn!("Record pool: failed to read {}: {}", id, err);
                return Ok(self.fresh_item(key));
            }
        };

        match serde_json::from_str::<CacheItem>(&record.data) {
            Ok(mut item) if item.key() == key => {
                item.set_clock(self.clock.clone());
                if item.is_hit() {
                    return Ok(item);
                }
                debug!("Record pool: dropping expired item {}", key);
            }
            _ => warn!("Record pool: discarding unreadable record {}", id),
        }

        self.remove_record(&id);
        Ok(self.fresh_item(key))
    }

    fn clear(&mut self) -> bool {
        self.deferred.clear();

        match self
            .store
            .delete_where(&RecordFilter::Namespace(self.namespace.clone()))
        {
            Ok(removed) => {
                debug!("Record pool {} cleared {} records", self.namespace, removed);
                true
            }
            Err(err) => {
                warn!("Record pool: failed to clear {}: {}", self.namespace, err);
                false
            }
        }
    }

    fn delete_item(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        self.deferred.remove(key);
        Ok(self.remove_record(&record_id(&self.namespace, key)))
    }

    fn save(&mut self, item: &mut CacheItem) -> bool {
        if validate_key(item.key()).is_err() {
            warn!("Record pool: refusing to save item with invalid key {:?}", item.key());
            return false;
        }

        item.set_hit(true);

        let stored = self
            .to_record(item)
            .and_then(|record| Ok(self.store.upsert(&record)?));

        match stored {
            Ok(()) => true,
            Err(err) => {
                warn!("Record pool: failed to save {}: {}", item.key(), err);
                item.set_hit(false);
                false
            }
        }
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
            "Record pool {} commit: {} items left pending",
            self.namespace,
            self.deferred.len()
        );
        committed
    }

    fn expired_items_sweeper(&mut self) -> Option<&mut dyn DeleteExpiredItems> {
        Some(self)
    }
}

impl<S: RecordStore> DeleteExpiredItems for RecordPool<S> {
    fn delete_expired_items(&mut self) -> bool {
        let filter = RecordFilter::ExpiredBefore {
            namespace: self.namespace.clone(),
            now: self.clock.now().timestamp_millis(),
        };

        match self.store.delete_where(&filter) {
            Ok(removed) => {
                debug!("Record pool {} sweep: removed {} items", self.namespace, removed);
                true
            }
            Err(err) => {
                warn!("Record pool: sweep of {} failed: {}", self.namespace, err);
                false
            }
        }
    }
}

impl<S: RecordStore> Drop for RecordPool<S> {
    fn drop(&mut self) {
        if !self.deferred.is_empty() && !self.commit() {
            warn!(
                "Record pool {} dropped with {} uncommitted items",
                self.namespace,
                self.deferred.len()
            );
        }
    }
}
