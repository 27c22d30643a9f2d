//! Clock Module
//!
//! Time source abstraction. Pools and items never read the system clock
//! directly, so tests can pin or shift time deterministically.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

// == Clock Trait ==
/// Supplies the current time.
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared clock handle carried by pools and items.
pub type SharedClock = Arc<dyn Clock>;

// == System Clock ==
/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Returns a shared handle to the system clock.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

// == Frozen Clock ==
/// Clock that only moves when told to.
///
/// `FrozenClock::default()` freezes the current wall-clock time.
#[derive(Debug)]
pub struct FrozenClock {
    now: Mutex<DateTime<Utc>>,
}

impl FrozenClock {
    /// Creates a clock frozen at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward (or backward for negative deltas).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Advances the clock by whole seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.advance(TimeDelta::seconds(secs));
    }

    /// Pins the clock to an absolute time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Returns a new, independent clock shifted by `delta` from this one.
    pub fn modified(&self, delta: TimeDelta) -> Self {
        Self::at(self.now() + delta)
    }

    /// Wraps the clock for use by pools and items.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for FrozenClock {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
