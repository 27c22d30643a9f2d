//! Registry Module
//!
//! Named pools and caches, either added ready-made or built lazily from a
//! factory on first lookup. Default names map roles ("general", "sessions")
//! onto registered names.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::cache::CachePool;
use crate::error::{CacheError, Result};
use crate::simple::SimpleCache;

/// Factory invoked with the registered name.
pub type Factory<T> = Box<dyn Fn(&str) -> Result<T>>;

enum Slot<T> {
    Ready(T),
    Pending(Factory<T>),
}

// == Registry ==
/// Name → instance registry with lazy construction.
pub struct Registry<T> {
    slots: IndexMap<String, Slot<T>>,
    defaults: IndexMap<String, String>,
}

/// Registry of item pools.
pub type PoolRegistry = Registry<Box<dyn CachePool>>;

/// Registry of simple caches.
pub type CacheRegistry = Registry<SimpleCache<Box<dyn CachePool>>>;

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            slots: IndexMap::new(),
            defaults: IndexMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Adds a ready instance, replacing any previous entry of that name.
    pub fn add(&mut self, name: impl Into<String>, instance: T) -> &mut Self {
        self.slots.insert(name.into(), Slot::Ready(instance));
        self
    }

    /// Registers a factory that builds the instance on first [`get`](Self::get).
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str) -> Result<T> + 'static,
    {
        self.slots.insert(name.into(), Slot::Pending(Box::new(factory)));
        self
    }

    /// Returns the named instance, building it if needed.
    ///
    /// # Errors
    /// `CacheError::Cache` if the name is unknown or the factory fails. A
    /// failed factory stays registered and is retried on the next lookup.
    pub fn get(&mut self, name: &str) -> Result<&mut T> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| CacheError::Cache(format!("{} not found", name)))?;

        if let Slot::Pending(factory) = slot {
            let instance = factory(name).map_err(|err| match err {
                CacheError::Cache(msg) => CacheError::Cache(msg),
                other => CacheError::Cache(other.to_string()),
            })?;
            info!("Created cache instance {}", name);
            *slot = Slot::Ready(instance);
        }

        let Slot::Ready(instance) = slot else {
            return Err(CacheError::Cache(format!("{} was not built", name)));
        };
        Ok(instance)
    }

    /// Returns true if `name` is registered, built or not.
    pub fn has(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Maps a default role onto a registered name.
    pub fn add_default(&mut self, role: impl Into<String>, name: impl Into<String>) -> &mut Self {
        let (role, name) = (role.into(), name.into());
        debug!("Default {} -> {}", role, name);
        self.defaults.insert(role, name);
        self
    }

    /// Returns the role → name mapping.
    pub fn defaults(&self) -> &IndexMap<String, String> {
        &self.defaults
    }

    /// Returns the instance behind a default role.
    pub fn get_default(&mut self, role: &str) -> Result<&mut T> {
        let name = self
            .defaults
            .get(role)
            .cloned()
            .ok_or_else(|| CacheError::Cache(format!("Default {} not found", role)))?;
        self.get(&name)
    }

    pub fn has_default(&self, role: &str) -> bool {
        self.defaults.contains_key(role)
    }

    /// Returns registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.slots.keys().map(String::as_str).collect()
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .field("defaults", &self.defaults)
            .finish()
    }
}
