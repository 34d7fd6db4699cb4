//! Key-value storage abstraction.
//!
//! [`StorageAdapter`] is the handle the persistence layer talks to. It wraps
//! any [`StorageBackend`] (in-memory map, directory of files, browser-style
//! storage bridge) and only delegates: failures from the backend propagate
//! unchanged, nothing is retried.

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::Arc;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;

/// A synchronous string-to-string store.
///
/// Implementations must be shareable across threads; the background sync
/// task writes through the same backend the caller hydrated from.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Cloneable handle over a shared [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct StorageAdapter {
    backend: Arc<dyn StorageBackend>,
}

impl StorageAdapter {
    /// Wraps an owned backend.
    #[must_use]
    pub fn new<B: StorageBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wraps a backend that is already shared elsewhere.
    #[must_use]
    pub fn from_shared(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`StorageError`].
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        tracing::trace!(key, "storage get");
        self.backend.get_item(key)
    }

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`StorageError`].
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tracing::trace!(key, bytes = value.len(), "storage set");
        self.backend.set_item(key, value)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`StorageError`].
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        tracing::trace!(key, "storage remove");
        self.backend.remove_item(key)
    }
}
