//! Simple Cache Module
//!
//! Direct key/value access on top of any [`CachePool`].

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::key::validate_keys;
use crate::cache::{CachePool, DeleteExpiredItems, Ttl};
use crate::error::Result;

// == Simple Cache ==
/// Key/value facade over a single pool.
///
/// Malformed keys fail with `CacheError::InvalidArgument` before the pool is
/// touched; backend failures come back as `false`.
#[derive(Debug)]
pub struct SimpleCache<P: CachePool> {
    pool: P,
    /// Default TTL for `set` / `set_multiple` when none is given
    ttl: Option<Ttl>,
}

impl<P: CachePool> SimpleCache<P> {
    // == Constructor ==
    pub fn new(pool: P, ttl: Option<Ttl>) -> Self {
        Self { pool, ttl }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut P {
        &mut self.pool
    }

    /// Unwraps the facade, handing back the pool.
    pub fn into_pool(self) -> P {
        self.pool
    }

    // == Get ==
    /// Returns the cached value, or `default` on a miss.
    pub fn get(&mut self, key: &str, default: Value) -> Result<Value> {
        let item = self.pool.get_item(key)?;
        Ok(item.get().cloned().unwrap_or(default))
    }

    // == Set ==
    /// Stores a value immediately.
    ///
    /// `ttl` overrides the facade default. With neither, the value never
    /// expires.
    pub fn set(&mut self, key: &str, value: impl Into<Value>, ttl: Option<Ttl>) -> Result<bool> {
        let mut item = self.pool.get_item(key)?;
        item.set(value).expires_after(ttl.or(self.ttl));

        Ok(self.pool.save(&mut item))
    }

    // == Delete ==
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        self.pool.delete_item(key)
    }

    pub fn clear(&mut self) -> bool {
        self.pool.clear()
    }

    // == Multiple ==
    /// Lazily yields `(key, value)` for every requested key, in order.
    ///
    /// All keys are validated up front; each value is fetched when the
    /// iterator reaches it. Misses yield `default`.
    pub fn get_multiple<I, K>(&mut self, keys: I, default: Value) -> Result<GetMultiple<'_, P>>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        validate_keys(keys.iter().map(String::as_str))?;

        Ok(GetMultiple {
            pool: &mut self.pool,
            keys: keys.into_iter(),
            default,
        })
    }

    /// Stores several values through one batched commit.
    ///
    /// Every value is queued even if an earlier one failed. Returns true only
    /// if every value was queued and the commit left nothing behind.
    pub fn set_multiple<I, K, V>(&mut self, values: I, ttl: Option<Ttl>) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values: Vec<(String, Value)> = values
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        validate_keys(values.iter().map(|(key, _)| key.as_str()))?;

        let ttl = ttl.or(self.ttl);
        let mut queued = true;

        for (key, value) in values {
            let mut item = self.pool.get_item(&key)?;
            item.set(value).expires_after(ttl);
            queued = self.pool.save_deferred(item) && queued;
        }

        let committed = self.pool.commit();
        if !committed {
            warn!("Simple cache: set_multiple commit left items pending");
        }

        Ok(queued && committed)
    }

    pub fn delete_multiple(&mut self, keys: &[&str]) -> Result<bool> {
        self.pool.delete_items(keys)
    }

    // == Has ==
    /// Checks for a live value.
    ///
    /// Meant for cache warming. Another writer can remove the key right
    /// after this returns true; read through [`get`](Self::get) instead of
    /// checking first.
    pub fn has(&mut self, key: &str) -> Result<bool> {
        self.pool.has_item(key)
    }

    /// Flushes any pending writes of the pool and disposes of the facade.
    pub fn close(mut self) -> bool {
        self.pool.commit()
    }
}

impl<P: CachePool> DeleteExpiredItems for SimpleCache<P> {
    /// Sweeps the pool if it supports it; returns false otherwise.
    fn delete_expired_items(&mut self) -> bool {
        match self.pool.expired_items_sweeper() {
            Some(sweeper) => sweeper.delete_expired_items(),
            None => {
                debug!("Simple cache: pool cannot delete expired items");
                false
            }
        }
    }
}

// == Get Multiple Iterator ==
/// Iterator returned by [`SimpleCache::get_multiple`].
pub struct GetMultiple<'a, P: CachePool> {
    pool: &'a mut P,
    keys: std::vec::IntoIter<String>,
    default: Value,
}

impl<P: CachePool> Iterator for GetMultiple<'_, P> {
    type Item = (String, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;

        let value = match self.pool.get_item(&key) {
            Ok(item) => item.get().cloned(),
            Err(err) => {
                warn!("Simple cache: lookup of {} failed: {}", key, err);
                None
            }
        };

        Some((key, value.unwrap_or_else(|| self.default.clone())))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}
