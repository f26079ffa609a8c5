//! Thread-safe shell around the byte-bounded LRU store.
//!
//! [`ByteCache`] is what a [`Group`](crate::group::Group) actually holds: a
//! mutex-guarded [`LruStore`] of [`ByteView`] values plus always-on aggregate
//! counters. The underlying store is built lazily on the first `add` — a
//! group whose keys all live on remote peers never allocates local storage.
//!
//! ## Locking
//!
//! One exclusive lock covers both lazy construction and every store
//! operation. `get` needs the exclusive lock too: an LRU hit promotes the
//! entry, which mutates recency order. Values escape the lock as cheap
//! `ByteView` clones, so holders never pin the mutex.
//!
//! ## Metrics
//!
//! Hit/miss/insert/eviction counters use relaxed atomics and are readable at
//! any time via [`ByteCache::metrics`]. These are per-cache aggregates, not
//! per-key statistics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::policy::lru::LruStore;
use crate::view::ByteView;

/// Snapshot of a cache shell's aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetrics {
    /// Number of successful lookups.
    pub hits: u64,
    /// Number of failed lookups.
    pub misses: u64,
    /// Number of `add` calls (inserts and updates alike).
    pub inserts: u64,
    /// Number of entries evicted by the byte budget.
    pub evictions: u64,
}

/// Counters shared with the store's eviction hook.
///
/// All increments use `Ordering::Relaxed`; the counters are monotone
/// aggregates with no cross-counter consistency requirement.
#[derive(Debug, Default)]
struct ShellCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

impl ShellCounters {
    fn snapshot(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Concurrent, lazily-constructed cache of [`ByteView`] values.
///
/// # Example
///
/// ```
/// use ringcache::cache::ByteCache;
/// use ringcache::view::ByteView;
///
/// let cache = ByteCache::new(1 << 20);
/// cache.add("greeting", ByteView::from("hello"));
///
/// assert_eq!(cache.get("greeting"), Some(ByteView::from("hello")));
/// assert_eq!(cache.get("absent"), None);
///
/// let metrics = cache.metrics();
/// assert_eq!(metrics.hits, 1);
/// assert_eq!(metrics.misses, 1);
/// ```
pub struct ByteCache {
    cache_bytes: usize,
    store: Mutex<Option<LruStore<ByteView>>>,
    counters: Arc<ShellCounters>,
}

impl ByteCache {
    /// Creates a shell with the given byte budget (`0` = unbounded).
    ///
    /// No storage is allocated until the first `add`.
    pub fn new(cache_bytes: usize) -> Self {
        ByteCache {
            cache_bytes,
            store: Mutex::new(None),
            counters: Arc::new(ShellCounters::default()),
        }
    }

    /// Inserts or updates an entry, evicting to the byte budget.
    ///
    /// Constructs the underlying store on first use, wiring its eviction
    /// hook to the shell's eviction counter.
    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.store.lock();
        let store = guard.get_or_insert_with(|| {
            let counters = Arc::clone(&self.counters);
            LruStore::with_eviction_hook(
                self.cache_bytes,
                Box::new(move |_key, _value| {
                    counters.evictions.fetch_add(1, Ordering::Relaxed);
                }),
            )
        });
        store.add(key, value);
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Looks up a key, promoting the entry on a hit.
    ///
    /// Returns a clone of the view; the underlying bytes are shared, not
    /// copied. Reports a miss if the store was never constructed.
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.store.lock();
        let view = guard.as_mut().and_then(|store| store.get(key).cloned());
        match view {
            Some(view) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(view)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Returns the number of live entries (0 before first use).
    pub fn len(&self) -> usize {
        self.store.lock().as_ref().map_or(0, LruStore::len)
    }

    /// Returns `true` if no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the accounted bytes currently held (0 before first use).
    pub fn now_bytes(&self) -> usize {
        self.store.lock().as_ref().map_or(0, LruStore::now_bytes)
    }

    /// Returns the configured byte budget.
    pub fn cache_bytes(&self) -> usize {
        self.cache_bytes
    }

    /// Returns a snapshot of the shell's counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.counters.snapshot()
    }
}

impl std::fmt::Debug for ByteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCache")
            .field("len", &self.len())
            .field("now_bytes", &self.now_bytes())
            .field("cache_bytes", &self.cache_bytes)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
