//! Local event identifier assigned by the cache storage

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an event row in the local cache
///
/// Ids are handed out by the storage (`EventStorage::next_id`); the external
/// source never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(i64);

impl EventId {
    /// Wrap a raw storage id
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw storage id
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EventId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}
