//! Convenience entry points around [`super::persist_configure`].

use std::sync::Arc;

use super::{Disposer, PersistOptions, PersistedRecord, persist_configure};
use crate::error::PersistError;
use crate::reactive::ReactiveTarget;
use crate::storage::StorageAdapter;
use crate::utils::observable_target_object;

/// Persists `properties` of `target` under `key` with default options.
///
/// # Errors
///
/// Same as [`persist_configure`].
pub fn use_persist<T, S>(
    target: Arc<T>,
    properties: &[S],
    key: &str,
    adapter: &StorageAdapter,
) -> Result<Disposer, PersistError>
where
    T: ReactiveTarget + ?Sized + 'static,
    S: AsRef<str>,
{
    let properties = properties.iter().map(|p| p.as_ref().to_string()).collect();
    persist_configure(
        target,
        properties,
        key,
        adapter.clone(),
        PersistOptions::default(),
    )
}

/// Deletes the persisted record stored under `key`.
///
/// # Errors
///
/// Propagates the storage backend's failure.
pub fn use_clear(key: &str, adapter: &StorageAdapter) -> Result<(), PersistError> {
    adapter.remove(key)?;
    tracing::debug!(key, "persisted record cleared");
    Ok(())
}

/// Returns `true` if the stored record matches the current values of
/// `properties` on `target`.
///
/// A missing or malformed record is reported as not synchronized.
/// Reserved record keys and stored properties outside `properties` are
/// ignored.
///
/// # Errors
///
/// Propagates the storage backend's failure.
pub fn is_synchronized<T, S>(
    target: &T,
    properties: &[S],
    key: &str,
    adapter: &StorageAdapter,
) -> Result<bool, PersistError>
where
    T: ReactiveTarget + ?Sized,
    S: AsRef<str>,
{
    let Some(raw) = adapter.get(key)? else {
        return Ok(false);
    };
    let Ok(record) = PersistedRecord::parse(&raw) else {
        return Ok(false);
    };
    let current = observable_target_object(target, properties);
    Ok(current == record.restricted_to(properties))
}
