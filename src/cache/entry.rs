//! Cache Entry Module
//!
//! Defines the item stored under each key: the value, its last-access
//! timestamp, and its effective TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// == Clock ==
/// Monotonic clock shared by a store and its items.
///
/// Timestamps are nanoseconds elapsed since the clock's epoch so that they
/// fit in an `AtomicU64`.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Returns the current time in nanoseconds since the epoch.
    pub fn now(&self) -> u64 {
        duration_to_nanos(self.epoch.elapsed())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a duration to nanoseconds, saturating at `u64::MAX` (~584 years).
pub fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

// == Item ==
/// A single entry of the store.
#[derive(Debug)]
pub struct Item<V> {
    /// The stored value
    value: V,
    /// Last access (nanoseconds since the store clock's epoch)
    last_access: AtomicU64,
    /// Effective time-to-live of this item
    ttl: Duration,
    /// Whether `ttl` was set explicitly and must survive plain puts
    custom_ttl: bool,
}

impl<V> Item<V> {
    // == Constructor ==
    /// Creates an item accessed at `now`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Effective TTL of the item
    /// * `custom_ttl` - Whether the TTL overrides the store default
    /// * `now` - Current clock reading
    pub fn new(value: V, ttl: Duration, custom_ttl: bool, now: u64) -> Self {
        Self {
            value,
            last_access: AtomicU64::new(now),
            ttl,
            custom_ttl,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    #[allow(dead_code)]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[allow(dead_code)]
    pub fn has_custom_ttl(&self) -> bool {
        self.custom_ttl
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    // == Touch ==
    /// Moves the last-access time forward to `now`.
    ///
    /// Only needs `&self`, so readers holding a shared lock can refresh an
    /// item. The timestamp never moves backwards, even when two readers race
    /// with clock readings taken in a different order.
    pub fn touch(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::AcqRel);
    }

    // == Replace ==
    /// Replaces the value in place and refreshes the timestamp.
    ///
    /// A `Some` TTL becomes the item's custom TTL. With `None`, a custom TTL
    /// is kept and a default TTL is reset to `default_ttl`.
    pub fn replace(&mut self, value: V, ttl: Option<Duration>, default_ttl: Duration, now: u64) {
        self.value = value;
        match ttl {
            Some(ttl) => {
                self.ttl = ttl;
                self.custom_ttl = true;
            }
            None if !self.custom_ttl => self.ttl = default_ttl,
            None => {}
        }
        self.touch(now);
    }

    // == Is Expired ==
    /// Checks if the item is stale at `now`.
    ///
    /// Boundary condition: an item is stale once `now - last_access >= ttl`.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.last_access()) >= duration_to_nanos(self.ttl)
    }

    // == Time To Live ==
    /// Returns the time left before the item becomes eligible for a sweep,
    /// or `Duration::ZERO` if it already is.
    pub fn ttl_remaining(&self, now: u64) -> Duration {
        let idle = now.saturating_sub(self.last_access());
        Duration::from_nanos(duration_to_nanos(self.ttl).saturating_sub(idle))
    }
}
