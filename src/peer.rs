//! Peer selection and peer fetch boundary.
//!
//! The load pipeline never talks to a network directly; it depends on two
//! small capabilities that a transport crate implements:
//!
//! - [`PeerPicker`] decides which remote node owns a key — or that the key
//!   is local.
//! - [`PeerGetter`] fetches a `(group, key)` pair from one remote node.
//!
//! [`RingPicker`] is the stock picker implementation: it owns a consistent
//! hash ring and a table of per-node getters, skips the local node, and
//! swaps the whole ring atomically when the peer set is configured. A
//! transport only has to supply one [`PeerGetter`] per node.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use ringcache::error::PeerError;
//! use ringcache::peer::{PeerGetter, PeerPicker, RingPicker};
//!
//! struct StubTransport(&'static str);
//!
//! impl PeerGetter for StubTransport {
//!     fn get(&self, _group: &str, key: &str) -> Result<Vec<u8>, PeerError> {
//!         Ok(format!("{}:{}", self.0, key).into_bytes())
//!     }
//! }
//!
//! let picker = RingPicker::new("node-a", 50);
//! picker.set_peers([
//!     ("node-a".to_string(), Arc::new(StubTransport("a")) as Arc<dyn PeerGetter>),
//!     ("node-b".to_string(), Arc::new(StubTransport("b")) as Arc<dyn PeerGetter>),
//! ]);
//!
//! // Keys owned by node-a resolve to None (they are local); keys owned by
//! // node-b resolve to its getter.
//! let _maybe_remote = picker.pick("some-key");
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ds::HashRing;
use crate::error::PeerError;

/// Default number of virtual ring points per peer.
pub const DEFAULT_REPLICAS: usize = 50;

/// Fetches a value for a `(group, key)` pair from one remote peer.
///
/// Implemented by transport clients (one instance per remote node). Any
/// failure — connect, status, decode — is reported as a [`PeerError`]; the
/// load pipeline treats them all the same and falls back to the origin.
pub trait PeerGetter: Send + Sync {
    /// Fetches the value for `key` in the named group.
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>, PeerError>;
}

/// Names the peer that owns a key.
///
/// Returns `None` when the key resolves to the local node or when no peers
/// are configured — in both cases the caller loads from the origin.
pub trait PeerPicker: Send + Sync {
    /// Returns the getter for the remote node owning `key`, if any.
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

struct PickerState {
    ring: HashRing,
    getters: FxHashMap<String, Arc<dyn PeerGetter>>,
}

/// Consistent-hash-based peer picker.
///
/// Owns the ring and the node→getter table behind one lock. The ring is
/// immutable between [`set_peers`](RingPicker::set_peers) calls; `set_peers`
/// rebuilds both ring and table and swaps them in atomically, so a lookup
/// never observes a half-configured peer set.
///
/// The local node (`self_name`) participates in the ring like any other
/// node, but `pick` returns `None` for keys it owns — local keys are served
/// by the local cache and origin, not by a network round trip.
pub struct RingPicker {
    self_name: String,
    replicas: usize,
    state: RwLock<PickerState>,
}

impl RingPicker {
    /// Creates a picker for the local node with no peers configured.
    ///
    /// `replicas` is the virtual-point count per node;
    /// [`DEFAULT_REPLICAS`] is a good default.
    pub fn new(self_name: impl Into<String>, replicas: usize) -> Self {
        RingPicker {
            self_name: self_name.into(),
            replicas,
            state: RwLock::new(PickerState {
                ring: HashRing::new(replicas),
                getters: FxHashMap::default(),
            }),
        }
    }

    /// Configures the full peer set, replacing any previous configuration.
    ///
    /// Each entry pairs a node name (as it appears on the ring) with the
    /// transport getter for that node. The local node should be included so
    /// the ring partitions the keyspace over every participant.
    pub fn set_peers<I>(&self, peers: I)
    where
        I: IntoIterator<Item = (String, Arc<dyn PeerGetter>)>,
    {
        let mut ring = HashRing::new(self.replicas);
        let mut getters = FxHashMap::default();
        for (name, getter) in peers {
            ring.add([name.clone()]);
            getters.insert(name, getter);
        }

        let mut state = self.state.write();
        state.ring = ring;
        state.getters = getters;
    }

    /// Returns the local node's name.
    pub fn self_name(&self) -> &str {
        &self.self_name
    }
}

impl PeerPicker for RingPicker {
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let owner = state.ring.get(key)?;
        if owner == self.self_name {
            return None;
        }
        debug!(key, owner, "picked remote peer");
        state.getters.get(owner).cloned()
    }
}

impl std::fmt::Debug for RingPicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("RingPicker")
            .field("self_name", &self.self_name)
            .field("replicas", &self.replicas)
            .field("peers", &state.getters.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
