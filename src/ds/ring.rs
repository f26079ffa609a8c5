//! Consistent-hash ring for deterministic key-to-node mapping.
//!
//! Maps an arbitrary keyspace onto a fixed set of named nodes so that each
//! key has exactly one owner and adding nodes moves only a small fraction of
//! the keyspace. Every real node contributes `replicas` virtual points on the
//! ring, which evens out the load across nodes with high probability.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Ring Lookup Flow                              │
//! │                                                                         │
//! │   add("a", "b"), replicas = 3                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   virtual points: hash("0a") hash("1a") hash("2a")                      │
//! │                   hash("0b") hash("1b") hash("2b")                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │   ring:   [ 17, 102, 383, 561, 790, 941 ]   (sorted ascending)          │
//! │   owners: { 17→"b", 102→"a", 383→"b", 561→"a", 790→"a", 941→"b" }       │
//! │                                                                         │
//! │   get(key):                                                             │
//! │     1. h = hash(key)                                                    │
//! │     2. binary-search the first point ≥ h                                │
//! │     3. none found → wrap to the first point (the ring is circular)      │
//! │     4. return owners[point]                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! Properties
//! ──────────
//! • Deterministic: a fixed node set and hash always yield the same owner
//! • Insertion-order independent: the sorted ring erases add() ordering
//! • Balanced: replicas spread each node across the hash space
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use ringcache::ds::HashRing;
//!
//! let mut ring = HashRing::new(50);
//! ring.add(["cache-a", "cache-b", "cache-c"]);
//!
//! let owner = ring.get("user:1234").unwrap();
//! assert!(["cache-a", "cache-b", "cache-c"].contains(&owner));
//!
//! // Same key, same owner, every time.
//! assert_eq!(ring.get("user:1234"), Some(owner));
//! ```
//!
//! ## When to Use
//!
//! - Partitioning a keyspace across cache peers
//! - Routing requests to the node that owns a key
//!
//! Nodes cannot be removed once added; membership changes are done by
//! building a fresh ring and swapping it in (see
//! [`RingPicker::set_peers`](crate::peer::RingPicker::set_peers)).

use rustc_hash::FxHashMap;

/// Hash function mapping bytes onto the `u32` ring space.
pub type RingHashFn = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Consistent-hash ring with virtual nodes.
///
/// The default hash is CRC32/IEEE, which is cheap, well distributed for this
/// purpose, and stable across processes — every peer computes the same ring
/// from the same node list. A custom hash can be injected for tests or for
/// stronger distribution guarantees.
///
/// # Example
///
/// ```
/// use ringcache::ds::HashRing;
///
/// // Inject an identity hash to make placement explicit.
/// let mut ring = HashRing::with_hasher(1, |data: &[u8]| {
///     std::str::from_utf8(data).unwrap().parse().unwrap()
/// });
/// ring.add(["10", "20"]);
///
/// assert_eq!(ring.get("15"), Some("20"));
/// assert_eq!(ring.get("25"), Some("10")); // wraps around
/// ```
pub struct HashRing {
    replicas: usize,
    hash: RingHashFn,
    ring: Vec<u32>,
    owners: FxHashMap<u32, String>,
}

impl HashRing {
    /// Creates an empty ring with `replicas` virtual points per node and the
    /// default CRC32/IEEE hash.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, crc32fast::hash)
    }

    /// Creates an empty ring with a custom hash function.
    pub fn with_hasher<F>(replicas: usize, hash: F) -> Self
    where
        F: Fn(&[u8]) -> u32 + Send + Sync + 'static,
    {
        HashRing {
            replicas,
            hash: Box::new(hash),
            ring: Vec::new(),
            owners: FxHashMap::default(),
        }
    }

    /// Adds real nodes to the ring.
    ///
    /// Each node contributes `replicas` virtual points, hashed from the
    /// replica index concatenated with the node name (`"0node"`, `"1node"`,
    /// …). The ring is re-sorted after the whole batch. If two virtual
    /// points collide across different nodes, the later insertion owns the
    /// point — acceptable at the sparsity this ring operates at.
    ///
    /// # Example
    ///
    /// ```
    /// use ringcache::ds::HashRing;
    ///
    /// let mut ring = HashRing::new(3);
    /// ring.add(["a", "b"]);
    /// assert_eq!(ring.len(), 6); // 2 nodes × 3 replicas
    /// ```
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for node in nodes {
            let node = node.into();
            for i in 0..self.replicas {
                let point = (self.hash)(format!("{i}{node}").as_bytes());
                self.ring.push(point);
                self.owners.insert(point, node.clone());
            }
        }
        self.ring.sort_unstable();
    }

    /// Returns the node that owns `key`, or `None` if the ring is empty.
    ///
    /// Ownership is the first virtual point clockwise from the key's hash;
    /// past the largest point the search wraps to the smallest.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }

        let h = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&point| point < h);
        let point = self.ring[idx % self.ring.len()];

        self.owners.get(&point).map(String::as_str)
    }

    /// Returns the number of virtual points on the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` if no nodes have been added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_points", &self.ring.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
