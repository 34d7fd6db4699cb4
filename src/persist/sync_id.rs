//! Identifier of a running persistence subscription.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one `persist_configure` call.
///
/// Wraps a UUID v4. Attached to every log line emitted by the sync task and
/// its disposer so that several persisted stores can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(uuid::Uuid);

impl SyncId {
    /// Creates a new random `SyncId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
