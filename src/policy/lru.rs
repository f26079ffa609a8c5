//! # Byte-Bounded Least Recently Used (LRU) Store
//!
//! Single-threaded LRU store with byte-accounted eviction. This is the core
//! storage primitive behind every cache group: an ordered map that tracks the
//! exact number of bytes it holds and evicts from the cold end whenever the
//! budget is exceeded.
//!
//! ## Architecture
//!
//! ```text
//!   ┌─────────────────────────────────────────────────────────────────────┐
//!   │                          LruStore<V>                                │
//!   │                                                                     │
//!   │   ┌───────────────────────────────────────────────────────────┐     │
//!   │   │  FxHashMap<String, NonNull<Node<V>>>                      │     │
//!   │   │                                                           │     │
//!   │   │  ┌─────────┬──────────────────────────────────────┐       │     │
//!   │   │  │   Key   │  node ptr                            │       │     │
//!   │   │  ├─────────┼──────────────────────────────────────┤       │     │
//!   │   │  │  "k1"   │  ────────────────────────────────┐   │       │     │
//!   │   │  │  "k2"   │  ──────────────────────────┐     │   │       │     │
//!   │   │  └─────────┴────────────────────────────┼─────┼───┘       │     │
//!   │   └────────────────────────────────────────-┼─────┼───────────┘     │
//!   │                                             │     │                 │
//!   │   ┌─────────────────────────────────────────┼─────┼─────────┐       │
//!   │   │  Doubly-linked node list (recency)      ▼     ▼         │       │
//!   │   │                                                         │       │
//!   │   │  head ──► ┌──────┐ ◄──► ┌──────┐ ◄── tail               │       │
//!   │   │    (MRU)  │ k2,v │      │ k1,v │   (next to evict)      │       │
//!   │   │           └──────┘      └──────┘                        │       │
//!   │   └─────────────────────────────────────────────────────────┘       │
//!   │                                                                     │
//!   │   max_bytes: budget (0 = unbounded)                                 │
//!   │   now_bytes: Σ (key.len() + value.weight()) over live entries       │
//!   └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Method             | Complexity | Description                              |
//! |--------------------|------------|------------------------------------------|
//! | `new(max_bytes)`   | O(1)       | Create a store with the given budget     |
//! | `add(k, v)`        | O(1)*      | Insert or update, then evict to budget   |
//! | `get(&k)`          | O(1)       | Lookup, promotes the entry to MRU        |
//! | `remove_oldest()`  | O(1)       | Evict the LRU entry, firing the hook     |
//! | `len()`            | O(1)       | Current entry count                      |
//! | `now_bytes()`      | O(1)       | Current accounted bytes                  |
//!
//! \* amortized — a single `add` can evict multiple entries to get back
//! under budget.
//!
//! ## Accounting Invariants
//!
//! - `now_bytes == Σ (key.len() + value.weight())` over live entries, after
//!   every operation.
//! - The index map and the recency list always contain the same key set.
//! - After `add` returns, either the store is unbounded (`max_bytes == 0`)
//!   or `now_bytes <= max_bytes`. An entry whose own size exceeds the budget
//!   is evicted by the same loop, leaving the store empty — oversize values
//!   are never retained.
//!
//! ## Eviction Ordering
//!
//! Strict LRU by last access; both `get` and `add` count as accesses. The
//! eviction hook runs after the entry has been unlinked from both the list
//! and the index, so a hook observing the store would see it already gone.
//!
//! ## Thread Safety
//!
//! None at this layer. Callers serialize access; the concurrent shell in
//! [`cache`](crate::cache) wraps this store in a mutex.

use std::fmt;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;

use crate::policy::Weighted;

/// Callback invoked with the key and value of every evicted entry.
///
/// Runs after the entry has been removed from the store's index and recency
/// list, and before the value is dropped (or handed to the caller, for
/// [`LruStore::remove_oldest`]).
pub type EvictionHook<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Node in the recency list.
///
/// The key is duplicated between the index map and its node so that eviction
/// from the list tail can find and remove the map entry.
struct Node<V> {
    prev: Option<NonNull<Node<V>>>,
    next: Option<NonNull<Node<V>>>,
    key: String,
    value: V,
}

/// Byte-bounded LRU store over string keys.
///
/// The index is an `FxHashMap` from key to a heap-allocated list node;
/// promotion is an O(1) unlink + push-front on the intrusive list. A budget
/// of `0` disables eviction entirely.
///
/// # Example
///
/// ```
/// use ringcache::policy::lru::LruStore;
///
/// let mut store: LruStore<String> = LruStore::new(10);
/// store.add("k1", "v1".to_string());
/// store.add("k2", "v2".to_string());
/// assert_eq!(store.now_bytes(), 8); // 2×(2-byte key + 2-byte value)
///
/// // A third entry pushes past the 10-byte budget; "k1" is coldest.
/// store.add("k3", "v3".to_string());
/// assert!(store.get("k1").is_none());
/// assert_eq!(store.get("k2"), Some(&"v2".to_string()));
/// ```
pub struct LruStore<V>
where
    V: Weighted,
{
    map: FxHashMap<String, NonNull<Node<V>>>,
    head: Option<NonNull<Node<V>>>,
    tail: Option<NonNull<Node<V>>>,
    max_bytes: usize,
    now_bytes: usize,
    on_evicted: Option<EvictionHook<V>>,
}

// SAFETY: LruStore can be sent between threads if V is Send. The raw node
// pointers only reference heap memory owned by the struct, and the eviction
// hook is bounded by Send.
unsafe impl<V> Send for LruStore<V> where V: Weighted + Send {}

// SAFETY: LruStore can be shared between threads if V is Sync. All &self
// methods are read-only; every list mutation and hook invocation requires
// &mut self, so shared references never touch the pointers or the hook.
unsafe impl<V> Sync for LruStore<V> where V: Weighted + Sync {}

impl<V> LruStore<V>
where
    V: Weighted,
{
    /// Creates a store with the given byte budget.
    ///
    /// A budget of `0` means unbounded: entries are never evicted.
    #[inline]
    pub fn new(max_bytes: usize) -> Self {
        LruStore {
            map: FxHashMap::default(),
            head: None,
            tail: None,
            max_bytes,
            now_bytes: 0,
            on_evicted: None,
        }
    }

    /// Creates a store that invokes `hook` for every evicted entry.
    ///
    /// # Example
    ///
    /// ```
    /// use ringcache::policy::lru::LruStore;
    ///
    /// let mut store: LruStore<String> =
    ///     LruStore::with_eviction_hook(8, Box::new(|key, _value| {
    ///         println!("evicted {key}");
    ///     }));
    /// store.add("k1", "v1".to_string());
    /// ```
    pub fn with_eviction_hook(max_bytes: usize, hook: EvictionHook<V>) -> Self {
        let mut store = LruStore::new(max_bytes);
        store.on_evicted = Some(hook);
        store
    }

    /// Returns the number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the store holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the accounted size of all live entries in bytes.
    #[inline]
    pub fn now_bytes(&self) -> usize {
        self.now_bytes
    }

    /// Returns the configured byte budget (`0` = unbounded).
    #[inline]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Returns `true` if the key exists, without touching recency order.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts or updates an entry, then evicts until back under budget.
    ///
    /// An existing key keeps its list node: the value is replaced, the byte
    /// accounting adjusted by the difference in value weights, and the entry
    /// promoted to most-recent. A new key is linked at the head and adds
    /// `key.len() + value.weight()` bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use ringcache::policy::lru::LruStore;
    ///
    /// let mut store: LruStore<String> = LruStore::new(0);
    /// store.add("key", "abc".to_string());
    /// assert_eq!(store.now_bytes(), 6);
    ///
    /// // Updating in place adjusts accounting by the weight difference.
    /// store.add("key", "abcdef".to_string());
    /// assert_eq!(store.now_bytes(), 9);
    /// assert_eq!(store.len(), 1);
    /// ```
    pub fn add(&mut self, key: &str, value: V) {
        if let Some(&node_ptr) = self.map.get(key) {
            let new_weight = value.weight();
            let old_weight = unsafe {
                let node = &mut *node_ptr.as_ptr();
                let old = node.value.weight();
                node.value = value;
                old
            };
            self.now_bytes = self.now_bytes - old_weight + new_weight;
            self.detach(node_ptr);
            self.attach_front(node_ptr);
        } else {
            self.now_bytes += key.len() + value.weight();
            let node = Box::new(Node {
                prev: None,
                next: None,
                key: key.to_owned(),
                value,
            });
            let node_ptr = NonNull::from(Box::leak(node));
            self.map.insert(key.to_owned(), node_ptr);
            self.attach_front(node_ptr);
        }

        while self.max_bytes != 0 && self.now_bytes > self.max_bytes {
            self.remove_oldest();
        }

        #[cfg(debug_assertions)]
        self.validate_invariants();
    }

    /// Looks up a key, promoting the entry to most-recent on a hit.
    ///
    /// A miss is a pure lookup with no structural change.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let node_ptr = *self.map.get(key)?;

        self.detach(node_ptr);
        self.attach_front(node_ptr);

        #[cfg(debug_assertions)]
        self.validate_invariants();

        unsafe { Some(&(*node_ptr.as_ptr()).value) }
    }

    /// Evicts the least-recent entry, if any, and returns it.
    ///
    /// The eviction hook (if configured) runs after the entry is removed
    /// from both the index and the recency list.
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let node = self.pop_tail()?;
        self.map.remove(node.key.as_str());
        self.now_bytes -= node.key.len() + node.value.weight();

        if let Some(hook) = self.on_evicted.as_mut() {
            hook(&node.key, &node.value);
        }

        #[cfg(debug_assertions)]
        self.validate_invariants();

        Some((node.key, node.value))
    }

    /// Detach a node from the recency list without touching the index.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Attach a node at the head (most-recent position).
    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }

    /// Pop the tail node (least-recent) and reclaim its box.
    #[inline(always)]
    fn pop_tail(&mut self) -> Option<Box<Node<V>>> {
        self.tail.map(|tail_ptr| unsafe {
            let node = Box::from_raw(tail_ptr.as_ptr());

            self.tail = node.prev;
            match self.tail {
                Some(mut t) => t.as_mut().next = None,
                None => self.head = None,
            }

            node
        })
    }

    /// Validate structural and accounting invariants (debug builds only).
    #[cfg(debug_assertions)]
    fn validate_invariants(&self) {
        if self.map.is_empty() {
            debug_assert!(self.head.is_none());
            debug_assert!(self.tail.is_none());
            debug_assert_eq!(self.now_bytes, 0);
            return;
        }

        let mut count = 0usize;
        let mut bytes = 0usize;
        let mut current = self.head;
        while let Some(ptr) = current {
            count += 1;
            unsafe {
                let node = ptr.as_ref();
                debug_assert!(self.map.contains_key(node.key.as_str()));
                bytes += node.key.len() + node.value.weight();
                current = node.next;
            }
            if count > self.map.len() {
                panic!("cycle detected in recency list");
            }
        }

        debug_assert_eq!(count, self.map.len());
        debug_assert_eq!(bytes, self.now_bytes);
    }
}

// Free all heap-allocated nodes on drop. The eviction hook is not invoked
// for entries discarded by drop.
impl<V> Drop for LruStore<V>
where
    V: Weighted,
{
    fn drop(&mut self) {
        while self.pop_tail().is_some() {}
    }
}

impl<V> fmt::Debug for LruStore<V>
where
    V: Weighted,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("len", &self.len())
            .field("now_bytes", &self.now_bytes)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}
