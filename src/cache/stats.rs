//! Cache Statistics Module
//!
//! Tracks store activity: lookups, expirations and reclaimer sweeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Store Stats ==
/// Point-in-time snapshot of store activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    /// Number of lookups that found their key
    pub hits: u64,
    /// Number of lookups that did not find their key
    pub misses: u64,
    /// Number of entries removed by the reclaimer
    pub expired: u64,
    /// Number of sweeps performed by the reclaimer
    pub sweeps: u64,
    /// Current number of entries in the table
    pub total_entries: usize,
    /// Wall-clock time of the most recent sweep
    pub last_sweep_at: Option<DateTime<Utc>>,
}

impl StoreStats {
    // == Hit Rate ==
    /// Calculates the lookup hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Live counters behind [`StoreStats`].
///
/// Lookups run under a shared lock, so every counter is atomic.
#[derive(Debug, Default)]
pub struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    sweeps: AtomicU64,
    last_sweep_at: Mutex<Option<DateTime<Utc>>>,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a lookup.
    pub fn record_lookup(&self, found: bool) {
        let counter = if found { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed sweep that removed `removed` entries.
    pub fn record_sweep(&self, removed: usize) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        let mut last = self
            .last_sweep_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(Utc::now());
    }

    // == Snapshot ==
    /// Copies the counters into a [`StoreStats`].
    pub fn snapshot(&self, total_entries: usize) -> StoreStats {
        let last_sweep_at = *self
            .last_sweep_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            total_entries,
            last_sweep_at,
        }
    }
}
