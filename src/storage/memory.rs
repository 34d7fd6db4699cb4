//! In-process storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use super::StorageBackend;
use crate::error::StorageError;

/// A `RwLock<HashMap>` backed store. Contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.items.read().map_err(poisoned)?.len())
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Backend("memory storage lock poisoned".to_string())
}

impl StorageBackend for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.items.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.items.write().map_err(poisoned)?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.items.write().map_err(poisoned)?;
        map.remove(key);
        Ok(())
    }
}
