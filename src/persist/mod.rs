//! Persistence layer: hydration, change sync, teardown and helpers.
//!
//! The entry point is [`persist_configure`]; [`use_persist`],
//! [`use_disposers`], [`use_clear`] and [`is_synchronized`] are thin
//! conveniences on top of it.

pub mod configure;
pub mod disposer;
pub mod hooks;
pub mod options;
pub mod record;
pub mod sync_id;

pub use configure::persist_configure;
pub use disposer::{Disposer, use_disposers};
pub use hooks::{is_synchronized, use_clear, use_persist};
pub use options::PersistOptions;
pub use record::PersistedRecord;
pub use sync_id::SyncId;
