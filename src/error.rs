//! Error types for the ringcache library.
//!
//! ## Key Components
//!
//! - [`LoadError`]: Returned by [`Group::get`](crate::group::Group::get) when
//!   a key is rejected or the origin loader fails.
//! - [`PeerError`]: Returned by peer transports. Never surfaces from the load
//!   pipeline — a failed peer fetch falls back to the origin loader.
//!
//! ## Example Usage
//!
//! ```
//! use ringcache::error::LoadError;
//!
//! let err = LoadError::Origin("record 42 not found".to_string());
//! assert_eq!(err.to_string(), "record 42 not found");
//!
//! // Errors are cloneable so one failed load can be shared with every
//! // caller waiting on the same in-flight request.
//! let shared = err.clone();
//! assert_eq!(err, shared);
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// LoadError
// ---------------------------------------------------------------------------

/// Error returned when a group lookup cannot produce a value.
///
/// `Origin` carries the origin loader's message verbatim; the cache adds no
/// framing of its own. The type is `Clone` because a single load may be
/// observed by many coalesced callers, all of which receive the same error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// An empty key was passed to `Group::get`.
    EmptyKey,
    /// The origin loader reported a failure; the message is forwarded
    /// unchanged.
    Origin(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::EmptyKey => f.write_str("key must not be empty"),
            LoadError::Origin(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for LoadError {}

// ---------------------------------------------------------------------------
// PeerError
// ---------------------------------------------------------------------------

/// Error returned when fetching a value from a remote peer fails.
///
/// Transport implementations construct this from whatever failure they hit
/// (connection refused, bad status, decode error). The load pipeline treats
/// every `PeerError` uniformly: it is logged and the lookup falls back to the
/// origin loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerError(String);

impl PeerError {
    /// Creates a new `PeerError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PeerError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
