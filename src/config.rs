//! Persistence configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). [`PersistConfig::options`] turns the
//! loaded values into per-subscription [`PersistOptions`].

use std::path::PathBuf;
use std::time::Duration;

use crate::error::PersistError;
use crate::persist::PersistOptions;
use crate::reactive::ReactiveApi;

/// Top-level configuration.
///
/// Loaded once at startup via [`PersistConfig::from_env`].
#[derive(Debug, Clone)]
pub struct PersistConfig {
    /// Directory used by the file-backed storage.
    pub storage_dir: PathBuf,

    /// Storage key the application persists under.
    pub key: String,

    /// Debounce window in milliseconds (0 = write on every change).
    pub debounce_ms: u64,

    /// Record lifetime in seconds (0 = never expires).
    pub expire_in_secs: u64,

    /// Remove expired records when they are found at hydration.
    pub remove_on_expiration: bool,

    /// Write the record once right after hydration.
    pub fire_immediately: bool,

    /// API shape of the reactive library.
    pub reactive_api: ReactiveApi,

    /// Info-level logging of hydration and writes.
    pub debug: bool,

    /// Capacity of each target's change bus.
    pub event_capacity: usize,

    /// Emit JSON formatted logs.
    pub log_json: bool,
}

impl PersistConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or unparseable.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Config`] if `PERSIST_REACTIVE_API` is set to
    /// something that is neither an API name nor a version string.
    pub fn from_env() -> Result<Self, PersistError> {
        dotenvy::dotenv().ok();

        let storage_dir = std::env::var("PERSIST_STORAGE_DIR")
            .map_or_else(|_| PathBuf::from(".persist"), PathBuf::from);
        let key = std::env::var("PERSIST_KEY").unwrap_or_else(|_| "app-state".to_string());

        let debounce_ms = parse_env("PERSIST_DEBOUNCE_MS", 0);
        let expire_in_secs = parse_env("PERSIST_EXPIRE_IN_SECS", 0);
        let remove_on_expiration = parse_env_bool("PERSIST_REMOVE_ON_EXPIRATION", true);
        let fire_immediately = parse_env_bool("PERSIST_FIRE_IMMEDIATELY", false);

        let reactive_api = match std::env::var("PERSIST_REACTIVE_API") {
            Ok(raw) => raw.parse()?,
            Err(_) => ReactiveApi::default(),
        };

        let debug = parse_env_bool("PERSIST_DEBUG", false);
        let event_capacity = parse_env("PERSIST_EVENT_CAPACITY", 1024);
        let log_json = parse_env_bool("PERSIST_LOG_JSON", false);

        Ok(Self {
            storage_dir,
            key,
            debounce_ms,
            expire_in_secs,
            remove_on_expiration,
            fire_immediately,
            reactive_api,
            debug,
            event_capacity,
            log_json,
        })
    }

    /// Builds the [`PersistOptions`] described by this configuration.
    #[must_use]
    pub fn options(&self) -> PersistOptions {
        PersistOptions {
            debounce: non_zero(self.debounce_ms).map(Duration::from_millis),
            expire_in: non_zero(self.expire_in_secs).map(Duration::from_secs),
            remove_on_expiration: self.remove_on_expiration,
            fire_immediately: self.fire_immediately,
            api: self.reactive_api,
            debug_mode: self.debug,
        }
    }
}

fn non_zero(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
