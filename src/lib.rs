//! # observable-persist
//!
//! Persists selected properties of a reactive state object to a pluggable
//! key-value storage and restores them on startup.
//!
//! The crate does not implement a reactivity engine or a storage engine.
//! It adapts anything implementing [`reactive::ReactiveTarget`] to anything
//! implementing [`storage::StorageBackend`], with JSON as the record format.
//!
//! ## Architecture
//!
//! ```text
//! Application
//!     │
//!     ├── use_persist / use_disposers / use_clear / is_synchronized
//!     │
//!     ├── persist_configure (persist/)
//!     │       ├── hydrate: StorageAdapter → ReactiveTarget
//!     │       └── sync task: ChangeBus → observable_target_object → StorageAdapter
//!     │
//!     ├── ReactiveTarget + ChangeBus (reactive/)
//!     │
//!     └── StorageAdapter → MemoryStorage | FileStorage (storage/)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use observable_persist::persist::{is_synchronized, use_persist};
//! use observable_persist::reactive::{ObservableObject, ReactiveTarget};
//! use observable_persist::storage::{MemoryStorage, StorageAdapter};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), observable_persist::error::PersistError> {
//! let adapter = StorageAdapter::new(MemoryStorage::new());
//! let store = Arc::new(
//!     ObservableObject::builder()
//!         .observable("count", json!(0))
//!         .build(),
//! );
//!
//! let disposer = use_persist(Arc::clone(&store), &["count"], "counter", &adapter)?;
//! store.set("count", json!(1))?;
//! // ... later
//! let _synced = is_synchronized(&*store, &["count"], "counter", &adapter)?;
//! disposer.dispose()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod persist;
pub mod reactive;
pub mod storage;
pub mod utils;
