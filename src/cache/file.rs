//! File Pool Module
//!
//! Pool storing one serialized item per file under a namespace folder.

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::key::validate_key;
use crate::cache::{
    CacheItem, CachePool, DeferredQueue, DeleteExpiredItems, Ttl, CACHE_FILE_SUFFIX,
};
use crate::clock::SharedClock;
use crate::error::{CacheError, Result};
use crate::storage::FileStore;

// == File Pool ==
/// Cache item pool on top of a [`FileStore`].
///
/// Each key maps to `<path>/<sha256(key)>.cache`. Clearing the pool removes
/// the whole folder.
#[derive(Debug)]
pub struct FilePool<S: FileStore> {
    storage: S,
    /// Folder holding this pool's files, without trailing slash
    path: String,
    deferred: DeferredQueue,
    clock: SharedClock,
    ttl: Option<Ttl>,
}

impl<S: FileStore> FilePool<S> {
    // == Constructor ==
    /// Creates a pool storing its files under `path`.
    ///
    /// # Errors
    /// `CacheError::Cache` if `path` is empty.
    pub fn new(
        storage: S,
        path: impl Into<String>,
        clock: SharedClock,
        ttl: Option<Ttl>,
    ) -> Result<Self> {
        let path = path.into().trim_end_matches('/').to_string();
        if path.is_empty() {
            return Err(CacheError::Cache("path must not be empty".to_string()));
        }

        Ok(Self {
            storage,
            path,
            deferred: DeferredQueue::new(),
            clock,
            ttl,
        })
    }

    /// Returns the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the storage path for `key`.
    pub fn storage_path(&self, key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        format!("{}/{}{}", self.path, hex::encode(digest), CACHE_FILE_SUFFIX)
    }

    /// Flushes deferred writes and disposes of the pool.
    pub fn close(mut self) -> bool {
        let committed = self.commit();
        if !committed {
            warn!(
                "File pool {} closed with {} uncommitted items",
                self.path,
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

    fn decode(&self, content: &[u8]) -> Option<CacheItem> {
        let mut item: CacheItem = serde_json::from_slice(content).ok()?;
        item.set_clock(self.clock.clone());
        Some(item)
    }

    fn remove_file(&self, path: &str) -> bool {
        match self.storage.delete(path) {
            Ok(()) => true,
            Err(err) if err.is_not_found() => true,
            Err(err) => {
                warn!("File pool: failed to delete {}: {}", path, err);
                false
            }
        }
    }
}

impl<S: FileStore> CachePool for FilePool<S> {
    fn get_item(&mut self, key: &str) -> Result<CacheItem> {
        validate_key(key)?;

        if let Some(item) = self.deferred.get(key) {
            return Ok(item.clone());
        }

        let path = self.storage_path(key);
        let content = match self.storage.read(&path) {
            Ok(content) => content,
            Err(err) if err.is_not_found() => return Ok(self.fresh_item(key)),
            Err(err) => {
                warn!("File pool: failed to read {}: {}", path, err);
                return Ok(self.fresh_item(key));
            }
        };

        match self.decode(&content) {
            Some(item) if item.key() == key && item.is_hit() => Ok(item),
            Some(_) => {
                debug!("File pool: dropping expired item {}", key);
                self.remove_file(&path);
                Ok(self.fresh_item(key))
            }
            None => {
                warn!("File pool: discarding unreadable item file {}", path);
                self.remove_file(&path);
                Ok(self.fresh_item(key))
            }
        }
    }

    fn clear(&mut self) -> bool {
        self.deferred.clear();

        match self.storage.delete_folder(&self.path) {
            Ok(()) => true,
            Err(err) if err.is_not_found() => true,
            Err(err) => {
                warn!("File pool: failed to clear {}: {}", self.path, err);
                false
            }
        }
    }

    fn delete_item(&mut self, key: &str) -> Result<bool> {
        validate_key(key)?;

        self.deferred.remove(key);
        Ok(self.remove_file(&self.storage_path(key)))
    }

    fn save(&mut self, item: &mut CacheItem) -> bool {
        if validate_key(item.key()).is_err() {
            warn!("File pool: refusing to save item with invalid key {:?}", item.key());
            return false;
        }

        item.set_hit(true);

        let content = match serde_json::to_vec(item) {
            Ok(content) => content,
            Err(err) => {
                warn!("File pool: failed to serialize {}: {}", item.key(), err);
                item.set_hit(false);
                return false;
            }
        };

        match self.storage.write(&self.storage_path(item.key()), &content) {
            Ok(()) => true,
            Err(err) => {
                warn!("File pool: failed to write {}: {}", item.key(), err);
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
            "File pool {} commit: {} items left pending",
            self.path,
            self.deferred.len()
        );
        committed
    }

    fn expired_items_sweeper(&mut self) -> Option<&mut dyn DeleteExpiredItems> {
        Some(self)
    }
}

impl<S: FileStore> DeleteExpiredItems for FilePool<S> {
    fn delete_expired_items(&mut self) -> bool {
        let files = match self.storage.list_files(&self.path) {
            Ok(files) => files,
            Err(err) if err.is_not_found() => return true,
            Err(err) => {
                warn!("File pool: failed to list {}: {}", self.path, err);
                return false;
            }
        };

        let now = self.clock.now();
        let mut success = true;
        let mut removed = 0usize;

        for file in files {
            if !file.path.ends_with(CACHE_FILE_SUFFIX) {
                continue;
            }

            let expired = match self.decode(&file.content) {
                Some(item) => !item.is_hit_at(now),
                None => true,
            };

            if expired {
                if self.remove_file(&file.path) {
                    removed += 1;
                } else {
                    success = false;
                }
            }
        }

        debug!("File pool {} sweep: removed {} items", self.path, removed);
        success
    }
}

impl<S: FileStore> Drop for FilePool<S> {
    fn drop(&mut self) {
        if !self.deferred.is_empty() && !self.commit() {
            warn!(
                "File pool {} dropped with {} uncommitted items",
                self.path,
                self.deferred.len()
            );
        }
    }
}
