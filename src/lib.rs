//! ringcache: distributed in-memory key/bytes caching primitives.
//!
//! Keys are partitioned across a static peer set by a consistent-hash ring;
//! each process serves its slice from a byte-bounded LRU, coalesces
//! concurrent loads per key, and falls back to a user-supplied origin loader.
//! See `DESIGN.md` for internal architecture and invariants.

pub mod cache;
pub mod ds;
pub mod error;
pub mod flight;
pub mod group;
pub mod peer;
pub mod policy;
pub mod prelude;
pub mod view;
