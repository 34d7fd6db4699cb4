//! Per-subscription persistence options.

use std::time::Duration;

use crate::reactive::ReactiveApi;

/// Options accepted by [`super::persist_configure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOptions {
    /// Quiet period to wait for after a change before writing.
    pub debounce: Option<Duration>,
    /// Lifetime of a written record. `None` never expires.
    pub expire_in: Option<Duration>,
    /// Remove an expired record from storage when it is found at hydration.
    pub remove_on_expiration: bool,
    /// Write the record once right after hydration.
    pub fire_immediately: bool,
    /// API shape used to apply hydrated values.
    pub api: ReactiveApi,
    /// Log hydration and writes at info level instead of debug.
    pub debug_mode: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            debounce: None,
            expire_in: None,
            remove_on_expiration: true,
            fire_immediately: false,
            api: ReactiveApi::Modern,
            debug_mode: false,
        }
    }
}

impl PersistOptions {
    /// Sets the debounce window.
    #[must_use]
    pub const fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    /// Sets the record lifetime.
    #[must_use]
    pub const fn with_expire_in(mut self, lifetime: Duration) -> Self {
        self.expire_in = Some(lifetime);
        self
    }

    /// Sets whether expired records are removed.
    #[must_use]
    pub const fn with_remove_on_expiration(mut self, remove: bool) -> Self {
        self.remove_on_expiration = remove;
        self
    }

    /// Sets whether the record is written right after hydration.
    #[must_use]
    pub const fn with_fire_immediately(mut self, fire: bool) -> Self {
        self.fire_immediately = fire;
        self
    }

    /// Sets the API shape.
    #[must_use]
    pub const fn with_api(mut self, api: ReactiveApi) -> Self {
        self.api = api;
        self
    }

    /// Enables or disables debug mode.
    #[must_use]
    pub const fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }
}
