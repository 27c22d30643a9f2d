//! Time To Live Module
//!
//! Relative expiration periods, either plain seconds or a calendar interval.

use std::time::Duration;

use chrono::{DateTime, Days, Months, TimeDelta, Utc};

// == Interval ==
/// Calendar-aware period, applied months first, then days, then the delta.
///
/// Adding one month to January 31st lands on the last day of February, the
/// same way calendar arithmetic does elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub months: u32,
    pub days: u64,
    pub delta: TimeDelta,
}

impl Interval {
    pub fn months(months: u32) -> Self {
        Self {
            months,
            ..Self::default()
        }
    }

    pub fn days(days: u64) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn delta(delta: TimeDelta) -> Self {
        Self {
            delta,
            ..Self::default()
        }
    }

    pub fn with_days(mut self, days: u64) -> Self {
        self.days = days;
        self
    }

    pub fn with_delta(mut self, delta: TimeDelta) -> Self {
        self.delta = delta;
        self
    }

    /// Adds the interval to `at`, returning `None` on overflow.
    pub fn add_to(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        at.checked_add_months(Months::new(self.months))?
            .checked_add_days(Days::new(self.days))?
            .checked_add_signed(self.delta)
    }
}

// == Ttl ==
/// Relative expiration period accepted by `CacheItem::expires_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Whole seconds from now
    Seconds(i64),
    /// Calendar interval from now
    Interval(Interval),
}

impl Ttl {
    /// Resolves the period against `now`.
    ///
    /// Returns `None` when the result does not fit the timestamp range; the
    /// caller then treats the item as never expiring.
    pub fn expiration_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Ttl::Seconds(secs) => now.checked_add_signed(TimeDelta::try_seconds(*secs)?),
            Ttl::Interval(interval) => interval.add_to(now),
        }
    }
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Ttl::Seconds(secs)
    }
}

impl From<u64> for Ttl {
    fn from(secs: u64) -> Self {
        Ttl::Seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }
}

impl From<Interval> for Ttl {
    fn from(interval: Interval) -> Self {
        Ttl::Interval(interval)
    }
}

impl From<TimeDelta> for Ttl {
    fn from(delta: TimeDelta) -> Self {
        Ttl::Interval(Interval::delta(delta))
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        match TimeDelta::from_std(duration) {
            Ok(delta) => Ttl::Interval(Interval::delta(delta)),
            Err(_) => Ttl::Seconds(i64::MAX),
        }
    }
}
