//! Named cache groups and the load pipeline.
//!
//! A [`Group`] is a cache namespace: it ties together an origin loader, a
//! local byte-bounded cache, an optional peer picker, and a single-flight
//! coalescer. Groups register themselves in a process-wide registry under
//! their name so transports can route incoming requests to them.
//!
//! ## Load Pipeline
//!
//! ```text
//!   get(key)
//!     │
//!     ├── empty key ───────────────────────────► Err(EmptyKey)
//!     │
//!     ├── local cache hit ─────────────────────► Ok(view)
//!     │
//!     └── miss → single-flight per key:
//!           │
//!           ├── picker names a remote peer
//!           │     │
//!           │     ├── peer fetch ok ───────────► Ok(view)   (not cached)
//!           │     └── peer fetch failed — log, fall through
//!           │
//!           └── origin loader
//!                 ├── ok → populate cache ─────► Ok(view)
//!                 └── err ─────────────────────► Err(Origin(msg))
//! ```
//!
//! Peer failures never surface: the origin remains the authority of last
//! resort. Origin failures surface verbatim, shared with every caller that
//! coalesced onto the same load. A successful peer fetch is returned without
//! populating the local cache — the owning peer maintains the entry.
//!
//! ## Example Usage
//!
//! ```
//! use ringcache::group::{get_group, Group, GetterError};
//!
//! let group = Group::new("temperatures", 1 << 20, |key: &str| -> Result<Vec<u8>, GetterError> {
//!     // Stand-in for a slow database lookup.
//!     Ok(format!("{key}: 21C").into_bytes())
//! });
//!
//! let view = group.get("office").unwrap();
//! assert_eq!(view.to_string(), "office: 21C");
//!
//! // Served from the local cache from now on.
//! assert!(get_group("temperatures").is_some());
//! assert_eq!(group.get("office").unwrap().to_string(), "office: 21C");
//! ```

use std::sync::{Arc, LazyLock, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::cache::{ByteCache, CacheMetrics};
use crate::error::LoadError;
use crate::flight::SingleFlight;
use crate::peer::{PeerGetter, PeerPicker};
use crate::view::ByteView;

/// Boxed error type accepted from origin loaders.
pub type GetterError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Loads authoritative bytes for a key from the origin (e.g. a database).
///
/// Invoked only when a key misses both the local cache and the peer that
/// owns it. An `Err` is surfaced to the caller of [`Group::get`] as
/// [`LoadError::Origin`] with the message forwarded unchanged. An empty byte
/// vector is a legitimate value and is cached like any other.
///
/// Any `Fn(&str) -> Result<Vec<u8>, GetterError> + Send + Sync` closure is a
/// `Getter`; implement the trait directly when the loader carries state.
pub trait Getter: Send + Sync {
    /// Fetches the value for `key` from the origin.
    fn fetch(&self, key: &str) -> Result<Vec<u8>, GetterError>;
}

impl<F> Getter for F
where
    F: Fn(&str) -> Result<Vec<u8>, GetterError> + Send + Sync,
{
    fn fetch(&self, key: &str) -> Result<Vec<u8>, GetterError> {
        self(key)
    }
}

/// Process-wide registry of groups by name.
static REGISTRY: LazyLock<RwLock<FxHashMap<String, Arc<Group>>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// Looks up a previously created group by name.
pub fn get_group(name: &str) -> Option<Arc<Group>> {
    REGISTRY.read().get(name).cloned()
}

/// A named cache namespace with its own loader, budget, and peer set.
///
/// Create with [`Group::new`]; the group registers itself under its name and
/// stays resolvable via [`get_group`] for the life of the process.
pub struct Group {
    name: String,
    getter: Box<dyn Getter>,
    main_cache: ByteCache,
    peers: OnceLock<Box<dyn PeerPicker>>,
    loader: SingleFlight<Result<ByteView, LoadError>>,
}

impl Group {
    /// Creates a group and registers it in the process registry.
    ///
    /// `cache_bytes` is the local cache budget (`0` = unbounded).
    /// Registering a second group under an existing name replaces the
    /// registry entry; holders of the old `Arc` keep a working group.
    pub fn new(name: impl Into<String>, cache_bytes: usize, getter: impl Getter + 'static) -> Arc<Group> {
        let name = name.into();
        let group = Arc::new(Group {
            name: name.clone(),
            getter: Box::new(getter),
            main_cache: ByteCache::new(cache_bytes),
            peers: OnceLock::new(),
            loader: SingleFlight::new(),
        });
        REGISTRY.write().insert(name, Arc::clone(&group));
        group
    }

    /// Returns the group's name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a snapshot of the local cache's counters.
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.main_cache.metrics()
    }

    /// Registers the peer picker for this group.
    ///
    /// # Panics
    ///
    /// Panics if called more than once — the peer set is wired up exactly
    /// once during process setup.
    pub fn register_peers(&self, picker: impl PeerPicker + 'static) {
        if self.peers.set(Box::new(picker)).is_err() {
            panic!("register_peers called more than once");
        }
    }

    /// Fetches the value for `key`.
    ///
    /// Serves from the local cache when possible; otherwise runs the load
    /// pipeline (peer fetch, then origin) with concurrent lookups of the
    /// same key collapsed into one load.
    ///
    /// # Errors
    ///
    /// - [`LoadError::EmptyKey`] if `key` is empty.
    /// - [`LoadError::Origin`] if the key missed everywhere and the origin
    ///   loader failed.
    pub fn get(&self, key: &str) -> Result<ByteView, LoadError> {
        if key.is_empty() {
            return Err(LoadError::EmptyKey);
        }
        if let Some(view) = self.main_cache.get(key) {
            return Ok(view);
        }
        self.load(key)
    }

    /// Loads a missing key, coalescing concurrent callers.
    fn load(&self, key: &str) -> Result<ByteView, LoadError> {
        self.loader.run(key, || {
            if let Some(picker) = self.peers.get() {
                if let Some(peer) = picker.pick(key) {
                    match self.from_peer(peer.as_ref(), key) {
                        Ok(view) => return Ok(view),
                        Err(err) => {
                            warn!(
                                group = %self.name,
                                key,
                                error = %err,
                                "peer fetch failed, falling back to origin"
                            );
                        }
                    }
                }
            }
            self.get_locally(key)
        })
    }

    /// Fetches from the peer that owns `key`.
    ///
    /// The result is not cached locally; the owner maintains the entry.
    fn from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView, crate::error::PeerError> {
        let bytes = peer.get(&self.name, key)?;
        Ok(ByteView::from(bytes))
    }

    /// Loads from the origin and populates the local cache.
    fn get_locally(&self, key: &str) -> Result<ByteView, LoadError> {
        let bytes = self
            .getter
            .fetch(key)
            .map_err(|err| LoadError::Origin(err.to_string()))?;
        let view = ByteView::from(bytes);
        self.main_cache.add(key, view.clone());
        Ok(view)
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache", &self.main_cache)
            .field("has_peers", &self.peers.get().is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(value: &'static [u8]) -> impl Getter {
        move |_: &str| -> Result<Vec<u8>, GetterError> { Ok(value.to_vec()) }
    }

    #[test]
    fn groups_are_resolvable_by_name() {
        let group = Group::new("registry-lookup", 1024, fixed(b"x"));

        let found = get_group("registry-lookup").expect("group was registered");
        assert_eq!(found.name(), "registry-lookup");
        assert!(Arc::ptr_eq(&group, &found));
    }

    #[test]
    fn unknown_group_name_resolves_to_none() {
        assert!(get_group("never-created").is_none());
    }

    #[test]
    fn empty_key_is_rejected() {
        let group = Group::new("empty-key-check", 1024, fixed(b"x"));
        assert_eq!(group.get(""), Err(LoadError::EmptyKey));
    }

    #[test]
    fn origin_error_message_is_forwarded_verbatim() {
        let group = Group::new("origin-error", 1024, |key: &str| -> Result<Vec<u8>, GetterError> {
            Err(format!("{key} does not exist").into())
        });

        assert_eq!(
            group.get("kkk"),
            Err(LoadError::Origin("kkk does not exist".to_string()))
        );
    }

    #[test]
    fn struct_getters_work_like_closures() {
        struct TableGetter;

        impl Getter for TableGetter {
            fn fetch(&self, key: &str) -> Result<Vec<u8>, GetterError> {
                match key {
                    "Tom" => Ok(b"630".to_vec()),
                    _ => Err(format!("{key} not found").into()),
                }
            }
        }

        let group = Group::new("struct-getter", 1024, TableGetter);
        assert_eq!(group.get("Tom").unwrap().to_vec(), b"630");
        assert!(group.get("Jerry").is_err());
    }
}
