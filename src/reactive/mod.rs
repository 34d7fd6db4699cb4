//! Reactive capability layer.
//!
//! The persistence logic never talks to a concrete state library. It only
//! needs the narrow [`ReactiveTarget`] capability set: property metadata
//! (`is_observable`, `is_computed`, `has_own`), reads and writes, and a
//! change subscription. [`ObservableObject`] is the in-crate implementation.

pub mod change_bus;
pub mod change_event;
pub mod filter;
pub mod observable;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

pub use change_bus::ChangeBus;
pub use change_event::ChangeEvent;
pub use filter::PropertyFilter;
pub use observable::{Fields, ObservableObject, ObservableObjectBuilder};

use crate::error::PersistError;

/// First major version of a reactive library exposing the modern API shape.
pub const MODERN_MAJOR_VERSION: u64 = 6;

/// Capabilities a reactive state object must expose to be persisted.
pub trait ReactiveTarget: Send + Sync {
    /// Returns `true` if changes to `property` emit change events.
    fn is_observable(&self, property: &str) -> bool;

    /// Returns `true` if `property` is derived and cannot be assigned.
    fn is_computed(&self, property: &str) -> bool;

    /// Returns `true` if the target itself owns `property`.
    fn has_own(&self, property: &str) -> bool;

    /// Reads the current value of `property`.
    fn get(&self, property: &str) -> Option<Value>;

    /// Assigns a single property.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::ReadOnlyProperty`] for computed properties.
    fn set(&self, property: &str, value: Value) -> Result<(), PersistError>;

    /// Assigns several properties as one batch.
    ///
    /// The default implementation assigns them one by one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::ReadOnlyProperty`] for computed properties.
    fn apply(&self, values: Vec<(String, Value)>) -> Result<(), PersistError> {
        for (property, value) in values {
            self.set(&property, value)?;
        }
        Ok(())
    }

    /// Returns the names of all own properties.
    fn keys(&self) -> Vec<String>;

    /// Subscribes to future change events.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// API shape of the reactive library behind a target.
///
/// Chosen at configuration time. `Modern` hydrates through one batched
/// [`ReactiveTarget::apply`]; `Legacy` assigns property by property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactiveApi {
    /// Library major version 6 or later.
    #[default]
    Modern,
    /// Library major version below 6.
    Legacy,
}

impl ReactiveApi {
    /// Maps a library version string (e.g. `"5.15.4"`) to an API shape.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Config`] if the major version is not a number.
    pub fn from_version(version: &str) -> Result<Self, PersistError> {
        let major = version
            .trim()
            .trim_start_matches('v')
            .split('.')
            .next()
            .unwrap_or_default();
        let major: u64 = major
            .parse()
            .map_err(|_| PersistError::Config(format!("invalid library version: {version}")))?;
        if major < MODERN_MAJOR_VERSION {
            Ok(Self::Legacy)
        } else {
            Ok(Self::Modern)
        }
    }
}

impl FromStr for ReactiveApi {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modern" => Ok(Self::Modern),
            "legacy" => Ok(Self::Legacy),
            other => Self::from_version(other),
        }
    }
}

impl fmt::Display for ReactiveApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modern => write!(f, "modern"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}
