//! Cache Item Module
//!
//! Defines the unit of cached state: key, payload, hit flag and expiration.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Ttl;
use crate::clock::{system_clock, SharedClock};

// == Cache Item ==
/// A cache entry handed out by a pool.
///
/// Items start as misses. Mutating the value puts the item back into the
/// miss state; it only becomes a hit again once a pool saves it.
///
/// The payload is opaque JSON. `Value::Null` is a legitimate stored value and
/// is told apart from "no value" by [`CacheItem::get`] returning `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheItem {
    key: String,
    value: Value,
    hit: bool,
    expiration: Option<DateTime<Utc>>,
    /// Not persisted; pools rebind their own clock after loading.
    #[serde(skip, default = "system_clock")]
    clock: SharedClock,
}

impl CacheItem {
    // == Constructor ==
    /// Creates a miss item with no value and no expiration.
    pub fn new(key: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            key: key.into(),
            value: Value::Null,
            hit: false,
            expiration: None,
            clock,
        }
    }

    /// Returns the item's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    // == Get ==
    /// Returns the value if the item is a hit at this moment.
    ///
    /// The hit check and the read happen against a single clock reading, so
    /// `get()` on its own is the race-free way to read an item. Calling
    /// `is_hit()` and then `get()` reads the clock twice.
    pub fn get(&self) -> Option<&Value> {
        if self.is_hit() {
            Some(&self.value)
        } else {
            None
        }
    }

    /// Returns the value decoded into `T`, or `None` on a miss or type mismatch.
    pub fn get_as<T: DeserializeOwned>(&self) -> Option<T> {
        self.get()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    // == Is Hit ==
    /// Confirms the item was saved and has not expired.
    ///
    /// Boundary condition: an item is still a hit when the current time equals
    /// its expiration, and expired once the current time is past it.
    pub fn is_hit(&self) -> bool {
        self.is_hit_at(self.clock.now())
    }

    pub(crate) fn is_hit_at(&self, now: DateTime<Utc>) -> bool {
        if !self.hit {
            return false;
        }

        match self.expiration {
            Some(expiration) => expiration >= now,
            None => true,
        }
    }

    // == Mutators ==
    /// Replaces the value. The item is a miss until it is saved again.
    pub fn set(&mut self, value: impl Into<Value>) -> &mut Self {
        self.value = value.into();
        self.hit = false;
        self
    }

    /// Sets an absolute expiration; `None` means the item never expires.
    pub fn expires_at(&mut self, expiration: Option<DateTime<Utc>>) -> &mut Self {
        self.expiration = expiration;
        self
    }

    /// Sets the expiration relative to the item's clock; `None` clears it.
    pub fn expires_after(&mut self, ttl: impl Into<Option<Ttl>>) -> &mut Self {
        self.expiration = ttl
            .into()
            .and_then(|ttl| ttl.expiration_from(self.clock.now()));
        self
    }

    /// Replaces the clock used for expiry checks.
    pub fn set_clock(&mut self, clock: SharedClock) -> &mut Self {
        self.clock = clock;
        self
    }

    pub(crate) fn set_hit(&mut self, hit: bool) -> &mut Self {
        self.hit = hit;
        self
    }

    // == Accessors ==
    /// Returns the absolute expiration, if any.
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    /// Returns the item's clock.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}
