//! Error types for storage backends and the persistence layer.
//!
//! [`PersistError`] is the central error type of the crate. Storage
//! failures are carried unchanged inside [`PersistError::Storage`];
//! malformed persisted data never surfaces here, it is logged and treated
//! as "no record".

/// Failure reported by a [`crate::storage::StorageBackend`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying I/O failure (file-backed stores).
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure (quota exceeded, poisoned lock, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors returned by the persistence operations.
///
/// # Error Codes
///
/// | Range     | Category                 |
/// |-----------|--------------------------|
/// | 1000–1999 | Caller / configuration   |
/// | 2000–2999 | Target object            |
/// | 3000–3999 | Storage / serialization  |
/// | 4000–4999 | Lifecycle                |
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Storage backend failure, propagated unchanged.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A record could not be encoded to JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Attempt to assign a computed (derived) property.
    #[error("property `{0}` is computed and cannot be set")]
    ReadOnlyProperty(String),

    /// `persist_configure` was called outside a tokio runtime.
    #[error("no tokio runtime available to run the sync task")]
    NoRuntime,

    /// One or more disposers in a composite teardown failed.
    #[error("{failed} of {total} disposers failed")]
    DisposeFailed {
        /// Number of disposers that returned an error or panicked.
        failed: usize,
        /// Number of disposers invoked.
        total: usize,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PersistError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(_) => 1001,
            Self::NoRuntime => 1002,
            Self::ReadOnlyProperty(_) => 2001,
            Self::Storage(_) => 3001,
            Self::Json(_) => 3002,
            Self::DisposeFailed { .. } => 4001,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_converts_into_persist_error() {
        let err: PersistError = StorageError::Backend("quota exceeded".to_string()).into();
        assert_eq!(err.error_code(), 3001);
        assert_eq!(
            err.to_string(),
            "storage error: storage backend error: quota exceeded"
        );
    }

    #[test]
    fn dispose_failed_message() {
        let err = PersistError::DisposeFailed {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 disposers failed");
        assert_eq!(err.error_code(), 4001);
    }

    #[test]
    fn read_only_property_message() {
        let err = PersistError::ReadOnlyProperty("total".to_string());
        assert!(err.to_string().contains("`total`"));
    }
}
