//! observable-persist demo entry point.
//!
//! Hydrates a small settings object from file storage, persists a few
//! mutations, and reports whether memory and storage agree.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use observable_persist::config::PersistConfig;
use observable_persist::persist::{is_synchronized, persist_configure, use_disposers};
use observable_persist::reactive::{ObservableObject, ReactiveTarget};
use observable_persist::storage::{FileStorage, StorageAdapter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = PersistConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(dir = %config.storage_dir.display(), key = config.key, "starting demo");

    // Build storage
    let storage = FileStorage::open(&config.storage_dir).context("opening storage directory")?;
    let adapter = StorageAdapter::new(storage);

    // Build the reactive target
    let settings = Arc::new(
        ObservableObject::builder()
            .observable("theme", json!("light"))
            .observable("font_size", json!(14))
            .observable("recent", json!([]))
            .plain("session_started", json!(chrono::Utc::now().to_rfc3339()))
            .computed("line_height", |f| json!(f.number("font_size") * 1.5))
            .capacity(config.event_capacity)
            .build(),
    );
    let properties: Vec<String> = ["theme", "font_size", "recent", "line_height"]
        .iter()
        .map(ToString::to_string)
        .collect();

    let disposer = persist_configure(
        Arc::clone(&settings),
        properties.clone(),
        config.key.clone(),
        adapter.clone(),
        config.options(),
    )?;
    tracing::info!(state = %serde_json::Value::Object(settings.snapshot()), "hydrated");

    // Mutate a few properties
    let next_size = settings
        .get("font_size")
        .and_then(|v| v.as_u64())
        .unwrap_or(14)
        .saturating_add(1);
    settings.set("font_size", json!(next_size))?;
    settings.set("theme", json!("dark"))?;
    settings.set("recent", json!(["notes.md", "todo.md"]))?;

    // Let the sync task flush
    let settle = Duration::from_millis(config.debounce_ms).saturating_add(Duration::from_millis(50));
    tokio::time::sleep(settle).await;

    let synced = is_synchronized(&*settings, &properties, &config.key, &adapter)?;
    tracing::info!(synced, "storage checked");

    use_disposers(vec![disposer]).dispose()?;
    Ok(())
}
