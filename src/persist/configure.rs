//! Hydration and the background sync task.
//!
//! [`persist_configure`] follows a fixed pattern: read the record, apply it
//! to the target, subscribe to the target's change bus, spawn the sync task,
//! return a [`Disposer`] that aborts the task.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{Disposer, PersistOptions, PersistedRecord, SyncId};
use crate::error::PersistError;
use crate::reactive::{ChangeEvent, PropertyFilter, ReactiveTarget};
use crate::storage::StorageAdapter;
use crate::utils::select_api;

/// Wires `properties` of `target` to `key` in `adapter`.
///
/// Hydrates the target from the stored record, then spawns a task on the
/// current tokio runtime that rewrites the record whenever a watched
/// observable property changes. The task only holds a weak reference to
/// `target`: it stops when the returned [`Disposer`] is invoked or when the
/// last strong reference to the target is dropped.
///
/// Background write failures have no caller; they are logged and the task
/// keeps running.
///
/// # Errors
///
/// Returns [`PersistError::NoRuntime`] outside a tokio runtime, and
/// propagates storage failures hit while hydrating or, with
/// `fire_immediately`, while writing the first record. A malformed stored
/// record is not an error: it is logged and the target is left untouched.
pub fn persist_configure<T>(
    target: Arc<T>,
    properties: Vec<String>,
    key: impl Into<String>,
    adapter: StorageAdapter,
    options: PersistOptions,
) -> Result<Disposer, PersistError>
where
    T: ReactiveTarget + ?Sized + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| PersistError::NoRuntime)?;

    let task = SyncTask {
        id: SyncId::new(),
        filter: PropertyFilter::new(properties.iter().map(String::as_str)),
        target: Arc::downgrade(&target),
        properties,
        key: key.into(),
        adapter,
        options,
    };

    let hydrated = task.hydrate(&*target)?;
    let rx = target.subscribe();
    if task.options.fire_immediately {
        task.write(&*target)?;
    }
    drop(target);

    let id = task.id;
    let key = task.key.clone();
    tracing::info!(%id, key, watched = task.filter.count(), hydrated, "persistence configured");

    let handle = runtime.spawn(task.run(rx));
    let abort = handle.abort_handle();
    Ok(Disposer::new(move || {
        abort.abort();
        tracing::info!(%id, key, "persistence disposed");
        Ok(())
    }))
}

fn apply_batched<T: ReactiveTarget + ?Sized>(
    target: &T,
    values: Vec<(String, Value)>,
) -> Result<(), PersistError> {
    target.apply(values)
}

fn apply_each<T: ReactiveTarget + ?Sized>(
    target: &T,
    values: Vec<(String, Value)>,
) -> Result<(), PersistError> {
    for (property, value) in values {
        target.set(&property, value)?;
    }
    Ok(())
}

/// State owned by one sync task.
struct SyncTask<T: ?Sized> {
    id: SyncId,
    target: Weak<T>,
    properties: Vec<String>,
    filter: PropertyFilter,
    key: String,
    adapter: StorageAdapter,
    options: PersistOptions,
}

impl<T: ReactiveTarget + ?Sized> SyncTask<T> {
    /// Applies the stored record to the target. Returns `true` if any
    /// value was applied.
    fn hydrate(&self, target: &T) -> Result<bool, PersistError> {
        let Some(raw) = self.adapter.get(&self.key)? else {
            return Ok(false);
        };
        let Ok(record) = PersistedRecord::parse(&raw) else {
            tracing::warn!(id = %self.id, key = self.key, "ignoring malformed persisted record");
            return Ok(false);
        };

        if record.is_expired(Utc::now()) {
            if self.options.remove_on_expiration {
                self.adapter.remove(&self.key)?;
            }
            tracing::info!(
                id = %self.id,
                key = self.key,
                removed = self.options.remove_on_expiration,
                "persisted record expired"
            );
            return Ok(false);
        }

        let values = record.restorable(target, &self.properties);
        if values.is_empty() {
            return Ok(false);
        }
        let count = values.len();
        let apply: fn(&T, Vec<(String, Value)>) -> Result<(), PersistError> =
            select_api(self.options.api, apply_batched::<T>, apply_each::<T>);
        apply(target, values)?;

        if self.options.debug_mode {
            tracing::info!(id = %self.id, key = self.key, count, api = %self.options.api, "hydrated");
        } else {
            tracing::debug!(id = %self.id, key = self.key, count, api = %self.options.api, "hydrated");
        }
        Ok(true)
    }

    /// Extracts the watched properties and writes them under the key.
    fn write(&self, target: &T) -> Result<(), PersistError> {
        let record = PersistedRecord::capture(target, &self.properties, self.options.expire_in);
        let json = record.to_json()?;
        self.adapter.set(&self.key, &json)?;

        if self.options.debug_mode {
            tracing::info!(id = %self.id, key = self.key, record = json, "record persisted");
        } else {
            tracing::debug!(id = %self.id, key = self.key, bytes = json.len(), "record persisted");
        }
        Ok(())
    }

    /// Receive loop: one write per watched change (or per settled burst
    /// when debouncing). Ends when the change bus closes or the target has
    /// been dropped.
    async fn run(self, mut rx: broadcast::Receiver<ChangeEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !self.filter.touches(&event) {
                        continue;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(id = %self.id, lagged = n, "sync task lagged behind change bus");
                }
                Err(RecvError::Closed) => break,
            }

            let open = match self.options.debounce {
                Some(window) => settle(&mut rx, &self.filter, window).await,
                None => true,
            };

            let Some(target) = self.target.upgrade() else {
                break;
            };
            if let Err(error) = self.write(&target) {
                tracing::error!(id = %self.id, key = self.key, %error, "failed to persist record");
            }
            if !open {
                break;
            }
        }
        tracing::debug!(id = %self.id, "sync task finished");
    }
}

/// Waits until no watched change arrives for `window`. Changes to other
/// properties do not restart the window. Returns `false` if the bus closed
/// while waiting.
async fn settle(
    rx: &mut broadcast::Receiver<ChangeEvent>,
    filter: &PropertyFilter,
    window: Duration,
) -> bool {
    let mut deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Err(_) => return true,
            Ok(Ok(event)) => {
                if filter.touches(&event) {
                    deadline = tokio::time::Instant::now() + window;
                }
            }
            Ok(Err(RecvError::Lagged(_))) => {
                deadline = tokio::time::Instant::now() + window;
            }
            Ok(Err(RecvError::Closed)) => return false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::reactive::ObservableObject;
    use crate::storage::{MemoryStorage, StorageBackend};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend whose reads fail.
    #[derive(Debug)]
    struct UnreadableBackend;

    impl StorageBackend for UnreadableBackend {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Backend("offline".to_string()))
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Ok(())
        }

        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    /// Memory backend whose first `failures` writes fail.
    #[derive(Debug)]
    struct FlakyBackend {
        inner: MemoryStorage,
        failures: AtomicUsize,
    }

    impl FlakyBackend {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryStorage::new(),
                failures: AtomicUsize::new(failures),
            }
        }

        fn failures_left(&self) -> usize {
            self.failures.load(Ordering::SeqCst)
        }
    }

    impl StorageBackend for FlakyBackend {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(StorageError::Backend("quota exceeded".to_string()));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    fn counter() -> Arc<ObservableObject> {
        Arc::new(
            ObservableObject::builder()
                .observable("count", json!(0))
                .observable("prefs", json!({"theme": "light"}))
                .plain("note", json!(""))
                .computed("double", |f| json!(f.number("count") * 2.0))
                .build(),
        )
    }

    fn props(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn stored(adapter: &StorageAdapter, key: &str) -> Option<Value> {
        let raw = adapter.get(key).ok()??;
        serde_json::from_str(&raw).ok()
    }

    /// Polls storage until `check` passes or a second elapses.
    async fn wait_for<F>(adapter: &StorageAdapter, key: &str, check: F) -> Option<Value>
    where
        F: Fn(&Value) -> bool,
    {
        for _ in 0..100 {
            if let Some(value) = stored(adapter, key)
                && check(&value)
            {
                return Some(value);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[test]
    fn outside_runtime_is_an_error() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let result = persist_configure(
            counter(),
            props(&["count"]),
            "k",
            adapter,
            PersistOptions::default(),
        );
        assert!(matches!(result, Err(PersistError::NoRuntime)));
    }

    #[tokio::test]
    async fn hydrates_from_existing_record() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let _ = adapter.set("k", r#"{"count":7,"prefs":"{\"theme\":\"dark\"}","double":1}"#);

        let target = counter();
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count", "prefs", "double"]),
            "k",
            adapter,
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };

        assert_eq!(target.get("count"), Some(json!(7)));
        assert_eq!(target.get("prefs"), Some(json!({"theme": "dark"})));
        assert_eq!(target.get("double"), Some(json!(14.0)));
        assert!(disposer.dispose().is_ok());
    }

    #[tokio::test]
    async fn legacy_api_hydrates_the_same_values() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let _ = adapter.set("k", r#"{"count":3,"note":"hi"}"#);

        let target = counter();
        let options = PersistOptions::default().with_api(crate::reactive::ReactiveApi::Legacy);
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count", "note"]),
            "k",
            adapter,
            options,
        ) else {
            panic!("configure failed");
        };
        assert_eq!(target.get("count"), Some(json!(3)));
        assert_eq!(target.get("note"), Some(json!("hi")));
        assert!(disposer.dispose().is_ok());
    }

    #[tokio::test]
    async fn malformed_record_leaves_target_untouched() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let _ = adapter.set("k", "{bad");

        let target = counter();
        let result = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter,
            PersistOptions::default(),
        );
        assert!(result.is_ok());
        assert_eq!(target.get("count"), Some(json!(0)));
    }

    #[tokio::test]
    async fn watched_change_is_written() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let target = counter();
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count", "prefs", "double"]),
            "k",
            adapter.clone(),
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };

        assert!(target.set("count", json!(5)).is_ok());
        let Some(record) = wait_for(&adapter, "k", |v| v["count"] == json!(5)).await else {
            panic!("record was not written");
        };
        assert_eq!(record["prefs"], json!(r#"{"theme":"light"}"#));
        assert!(record.get("double").is_none());
        assert!(disposer.dispose().is_ok());
    }

    #[tokio::test]
    async fn unwatched_change_is_not_written() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let target = counter();
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["prefs"]),
            "k",
            adapter.clone(),
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };

        assert!(target.set("count", json!(1)).is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(adapter.get("k"), Ok(None)));
        assert!(disposer.dispose().is_ok());
    }

    #[tokio::test]
    async fn fire_immediately_writes_after_hydration() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let options = PersistOptions::default().with_fire_immediately(true);
        let Ok(_disposer) = persist_configure(
            counter(),
            props(&["count", "note"]),
            "k",
            adapter.clone(),
            options,
        ) else {
            panic!("configure failed");
        };
        assert_eq!(stored(&adapter, "k"), Some(json!({"count": 0, "note": ""})));
    }

    #[tokio::test]
    async fn dispose_stops_writes() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let target = counter();
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter.clone(),
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };

        assert!(target.set("count", json!(1)).is_ok());
        assert!(wait_for(&adapter, "k", |v| v["count"] == json!(1)).await.is_some());

        assert!(disposer.dispose().is_ok());
        assert!(disposer.dispose().is_ok());
        tokio::task::yield_now().await;

        assert!(target.set("count", json!(2)).is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stored(&adapter, "k"), Some(json!({"count": 1})));
    }

    #[tokio::test]
    async fn expired_record_is_ignored_and_removed() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let _ = adapter.set("k", r#"{"__expires_at":"2001-01-01T00:00:00Z","count":9}"#);

        let target = counter();
        let Ok(_disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter.clone(),
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };
        assert_eq!(target.get("count"), Some(json!(0)));
        assert!(matches!(adapter.get("k"), Ok(None)));
    }

    #[tokio::test]
    async fn expired_record_kept_when_removal_disabled() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let _ = adapter.set("k", r#"{"__expires_at":"2001-01-01T00:00:00Z","count":9}"#);

        let options = PersistOptions::default().with_remove_on_expiration(false);
        let target = counter();
        let Ok(_disposer) =
            persist_configure(Arc::clone(&target), props(&["count"]), "k", adapter.clone(), options)
        else {
            panic!("configure failed");
        };
        assert_eq!(target.get("count"), Some(json!(0)));
        assert!(matches!(adapter.get("k"), Ok(Some(_))));
    }

    #[tokio::test]
    async fn written_record_carries_expiry() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let options = PersistOptions::default()
            .with_expire_in(Duration::from_secs(3600))
            .with_fire_immediately(true);
        let Ok(_disposer) =
            persist_configure(counter(), props(&["count"]), "k", adapter.clone(), options)
        else {
            panic!("configure failed");
        };
        let Some(record) = stored(&adapter, "k") else {
            panic!("record expected");
        };
        assert!(record.get("__expires_at").is_some());
        assert_eq!(record["count"], json!(0));
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_coalesces_bursts() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let target = counter();
        let options = PersistOptions::default().with_debounce(Duration::from_millis(100));
        let Ok(_disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter.clone(),
            options,
        ) else {
            panic!("configure failed");
        };

        for n in 1..=5 {
            assert!(target.set("count", json!(n)).is_ok());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // still inside the quiet period
        assert!(matches!(adapter.get("k"), Ok(None)));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(stored(&adapter, "k"), Some(json!({"count": 5})));
    }

    #[tokio::test]
    async fn hydration_read_failure_reaches_caller() {
        let adapter = StorageAdapter::new(UnreadableBackend);
        let result = persist_configure(
            counter(),
            props(&["count"]),
            "k",
            adapter,
            PersistOptions::default(),
        );
        assert!(matches!(
            result,
            Err(PersistError::Storage(StorageError::Backend(_)))
        ));
    }

    #[tokio::test]
    async fn first_write_failure_reaches_caller() {
        let adapter = StorageAdapter::new(FlakyBackend::new(1));
        let options = PersistOptions::default().with_fire_immediately(true);
        let result = persist_configure(counter(), props(&["count"]), "k", adapter, options);
        assert!(matches!(
            result,
            Err(PersistError::Storage(StorageError::Backend(_)))
        ));
    }

    #[tokio::test]
    async fn background_write_failure_keeps_task_running() {
        let backend = Arc::new(FlakyBackend::new(1));
        let adapter = StorageAdapter::from_shared(Arc::clone(&backend) as Arc<dyn StorageBackend>);
        let target = counter();
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter.clone(),
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };

        assert!(target.set("count", json!(1)).is_ok());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.failures_left(), 0);
        assert!(matches!(adapter.get("k"), Ok(None)));

        assert!(target.set("count", json!(2)).is_ok());
        assert!(wait_for(&adapter, "k", |v| v["count"] == json!(2)).await.is_some());
        assert!(disposer.dispose().is_ok());
    }

    #[tokio::test]
    async fn dropped_target_ends_sync_task() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let target = counter();
        let weak = Arc::downgrade(&target);
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter.clone(),
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };

        // neither the disposer nor the task keeps the target alive
        drop(disposer);
        drop(target);
        assert!(weak.upgrade().is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(adapter.get("k"), Ok(None)));
    }

    #[tokio::test]
    async fn change_written_while_target_alive_without_disposer() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let target = counter();
        let Ok(disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter.clone(),
            PersistOptions::default(),
        ) else {
            panic!("configure failed");
        };
        drop(disposer);

        assert!(target.set("count", json!(4)).is_ok());
        assert!(wait_for(&adapter, "k", |v| v["count"] == json!(4)).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_ignores_unwatched_traffic() {
        let adapter = StorageAdapter::new(MemoryStorage::new());
        let target = counter();
        let options = PersistOptions::default().with_debounce(Duration::from_millis(100));
        let Ok(_disposer) = persist_configure(
            Arc::clone(&target),
            props(&["count"]),
            "k",
            adapter.clone(),
            options,
        ) else {
            panic!("configure failed");
        };

        assert!(target.set("count", json!(1)).is_ok());
        for n in 0..6 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(target.set("prefs", json!({"theme": n})).is_ok());
        }
        assert_eq!(stored(&adapter, "k"), Some(json!({"count": 1})));
    }
}
