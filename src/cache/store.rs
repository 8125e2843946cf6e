//! Cache Store Module
//!
//! The expiring store: a hash table behind a reader/writer lock, with a
//! background reclaimer removing entries that were not accessed within
//! their TTL.

use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::entry::{Clock, Item};
use crate::cache::reentrancy::{self, ExclusiveSection};
use crate::cache::stats::{StatsCounters, StoreStats};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::tasks::{spawn_reclaimer, CancelSignal, Reclaim};

static NEXT_STORE_ID: AtomicUsize = AtomicUsize::new(0);

type Table<K, V> = HashMap<K, Item<V>>;

// == Shared State ==
/// State shared between a store handle and its reclaimer.
struct Shared<K, V> {
    /// Identifies the store for re-entrancy detection
    id: usize,
    /// Key-value storage
    table: RwLock<Table<K, V>>,
    config: StoreConfig,
    clock: Clock,
    /// Set once, by whichever of shutdown, drop or cancellation comes first
    closed: AtomicBool,
    /// Tells the reclaimer to stop
    stop_tx: watch::Sender<bool>,
    stats: StatsCounters,
}

impl<K, V> Shared<K, V> {
    fn read(&self) -> RwLockReadGuard<'_, Table<K, V>> {
        reentrancy::assert_not_reentrant(self.id);
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    // Callbacks may panic while the write lock is held. Every operation leaves
    // the map consistent before calling user code, so poisoning is ignored.
    fn write(&self) -> RwLockWriteGuard<'_, Table<K, V>> {
        reentrancy::assert_not_reentrant(self.id);
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> bool {
        let first = self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.stop_tx.send_replace(true);
        }
        first
    }

    // == Sweep ==
    /// Removes every entry whose idle time reached its TTL.
    ///
    /// The clock is read once, after the write lock is acquired.
    fn sweep(&self) -> usize {
        let removed = {
            let mut table = self.write();
            let now = self.clock.now();
            let before = table.len();
            table.retain(|_, item| !item.is_expired(now));
            before - table.len()
        };
        self.stats.record_sweep(removed);
        removed
    }
}

impl<K, V> Reclaim for Shared<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn sweep(&self) -> usize {
        Shared::sweep(self)
    }

    fn is_closed(&self) -> bool {
        Shared::is_closed(self)
    }

    fn close(&self) -> bool {
        Shared::close(self)
    }
}

// == Expiring Store ==
/// A concurrent key-value store whose entries expire after a period of
/// inactivity.
///
/// Every `put` and `put_with_ttl` sets an entry's last-access time. With
/// `refresh_on_read` enabled, [`get`](Self::get) sets it too, so only
/// entries that are neither written nor read within their TTL are removed.
/// [`get_passive`](Self::get_passive) never extends an entry's life.
///
/// Expiry is not instant: a background reclaimer sweeps the table every
/// `sweep_interval`, so a stale entry may stay visible for up to one
/// interval after its TTL has elapsed. The reclaimer runs on the tokio
/// runtime the store was created in, and stops on [`shutdown`](Self::shutdown),
/// when the store is dropped, or when the cancellation signal passed to
/// [`with_cancellation`](Self::with_cancellation) completes. Once stopped,
/// the store keeps working as a plain map whose entries never expire.
///
/// All operations are synchronous. Lookups share a read lock; anything that
/// changes the table takes the write lock.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use ttl_store::{ExpiringStore, StoreConfig};
///
/// #[tokio::main]
/// async fn main() -> ttl_store::error::Result<()> {
///     let config = StoreConfig::new(Duration::from_millis(300), Duration::from_millis(100));
///     let store = ExpiringStore::new(config)?;
///
///     store.put("session", 42);
///     assert_eq!(store.get("session"), Some(42));
///
///     store.shutdown();
///     Ok(())
/// }
/// ```
pub struct ExpiringStore<K, V> {
    shared: Arc<Shared<K, V>>,
    reclaimer: JoinHandle<()>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a store and starts its reclaimer.
    ///
    /// # Errors
    /// - [`StoreError::InvalidConfig`] if `sweep_interval` is zero
    /// - [`StoreError::NoRuntime`] if called outside a tokio runtime
    pub fn new(config: StoreConfig) -> Result<Self> {
        Self::start(config, None)
    }

    /// Creates a store whose reclaimer also stops, closing the store, when
    /// `signal` completes.
    ///
    /// Cancellation and [`shutdown`](Self::shutdown) may happen in any order
    /// and any number of times; the store is closed exactly once.
    ///
    /// # Arguments
    /// * `config` - Store configuration
    /// * `signal` - Future that completes on cancellation
    pub fn with_cancellation<F>(config: StoreConfig, signal: F) -> Result<Self>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::start(config, Some(Box::pin(signal)))
    }

    fn start(config: StoreConfig, cancel: Option<CancelSignal>) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;

        let mut table = HashMap::new();
        if table.try_reserve(config.initial_capacity).is_err() {
            debug!(
                "Ignoring capacity hint of {} entries: allocation failed",
                config.initial_capacity
            );
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let sweep_interval = config.sweep_interval;
        let shared = Arc::new(Shared {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            table: RwLock::new(table),
            config,
            clock: Clock::new(),
            closed: AtomicBool::new(false),
            stop_tx,
            stats: StatsCounters::new(),
        });

        let reclaimer = spawn_reclaimer(
            &runtime,
            Arc::downgrade(&shared),
            sweep_interval,
            stop_rx,
            cancel,
        );

        info!(
            "Expiring store initialized: default_ttl={}ms, sweep_interval={}ms, refresh_on_read={}",
            shared.config.default_ttl.as_millis(),
            sweep_interval.as_millis(),
            shared.config.refresh_on_read
        );

        Ok(Self { shared, reclaimer })
    }

    // == Put ==
    /// Inserts or replaces the value under `key` and refreshes its
    /// last-access time.
    ///
    /// New entries get the store's default TTL. An entry that already holds a
    /// custom TTL from [`put_with_ttl`](Self::put_with_ttl) keeps it.
    pub fn put(&self, key: K, value: V) {
        self.insert(key, value, None);
    }

    // == Put With TTL ==
    /// Inserts or replaces the value under `key` with its own TTL, overriding
    /// the store default and any earlier custom TTL.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.insert(key, value, Some(ttl));
    }

    fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let default_ttl = self.shared.config.default_ttl;
        let mut table = self.shared.write();
        let now = self.shared.clock.now();

        match table.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.get_mut().replace(value, ttl, default_ttl, now);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Item::new(
                    value,
                    ttl.unwrap_or(default_ttl),
                    ttl.is_some(),
                    now,
                ));
            }
        }
    }

    // == Get ==
    /// Returns a clone of the value under `key`, or `None` if absent.
    ///
    /// Refreshes the entry's last-access time when the store was configured
    /// with `refresh_on_read`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.lookup(key, self.shared.config.refresh_on_read)
    }

    // == Get Passive ==
    /// Returns a clone of the value under `key` without extending its life.
    pub fn get_passive<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.lookup(key, false)
    }

    fn lookup<Q>(&self, key: &Q, refresh: bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let table = self.shared.read();
        let value = table.get(key).map(|item| {
            if refresh {
                item.touch(self.shared.clock.now());
            }
            item.value().clone()
        });
        self.shared.stats.record_lookup(value.is_some());
        value
    }

    // == Contains Key ==
    /// Returns true if `key` is in the table. Never refreshes the entry.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.read().contains_key(key)
    }

    // == Remaining TTL ==
    /// Returns how long `key` may stay idle before the next sweep removes it.
    ///
    /// `Some(Duration::ZERO)` means the entry is stale but not swept yet.
    /// Never refreshes the entry.
    pub fn remaining_ttl<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let table = self.shared.read();
        let now = self.shared.clock.now();
        table.get(key).map(|item| item.ttl_remaining(now))
    }

    // == Remove ==
    /// Removes `key`, returning its value if it was present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.write().remove(key).map(Item::into_value)
    }

    // == Remove Where ==
    /// Removes every entry for which `predicate` returns true and returns the
    /// number of removed entries.
    ///
    /// The predicate is called once per entry while the write lock is held.
    ///
    /// # Panics
    /// Calling any method of this store from inside `predicate` panics.
    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut table = self.shared.write();
        let _section = ExclusiveSection::enter(self.shared.id);

        let before = table.len();
        table.retain(|key, item| !predicate(key, item.value()));
        before - table.len()
    }

    // == Clear ==
    /// Removes all entries.
    pub fn clear(&self) {
        self.shared.write().clear();
    }

    // == Length ==
    /// Returns the number of entries in the table.
    ///
    /// Stale entries count until a sweep removes them.
    pub fn len(&self) -> usize {
        self.shared.read().len()
    }

    // == Is Empty ==
    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.shared.read().is_empty()
    }

    // == For Each ==
    /// Calls `visit` for each entry, in no particular order, until it returns
    /// false.
    ///
    /// The value is passed mutably and may be updated in place. Visiting does
    /// not refresh entries. The write lock is held for the whole iteration.
    ///
    /// # Panics
    /// Calling any method of this store from inside `visit` panics. To change
    /// the store based on what was visited, collect the work and apply it
    /// after `for_each` returns, or hand it to another task.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut table = self.shared.write();
        let _section = ExclusiveSection::enter(self.shared.id);

        for (key, item) in table.iter_mut() {
            if !visit(key, item.value_mut()) {
                break;
            }
        }
    }

    // == Stats ==
    /// Returns a snapshot of the store's statistics.
    pub fn stats(&self) -> StoreStats {
        self.shared.stats.snapshot(self.len())
    }
}

impl<K, V> ExpiringStore<K, V> {
    // == Shutdown ==
    /// Stops the reclaimer for good. Entries no longer expire afterwards.
    ///
    /// Safe to call any number of times from any thread, including after the
    /// cancellation signal fired. Does not wait for a sweep in progress.
    pub fn shutdown(&self) {
        if self.shared.close() {
            debug!("Expiring store shut down");
        }
    }

    /// Returns true once the store has been shut down or cancelled.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Returns true once the reclaimer task has exited.
    pub fn reclaimer_finished(&self) -> bool {
        self.reclaimer.is_finished()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }
}

impl<K, V> Drop for ExpiringStore<K, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<K, V> fmt::Debug for ExpiringStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("config", &self.shared.config)
            .field("closed", &self.shared.is_closed())
            .finish_non_exhaustive()
    }
}
