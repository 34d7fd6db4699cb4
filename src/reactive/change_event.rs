//! Change notifications emitted by reactive targets.
//!
//! Every observable mutation on a [`super::ReactiveTarget`] publishes a
//! [`ChangeEvent`] through its [`super::ChangeBus`]. Plain (non-observable)
//! properties never emit events.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Notification that one or more observable properties changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A single property was assigned.
    PropertySet {
        /// Name of the changed property.
        property: String,
        /// Server-side timestamp of the mutation.
        timestamp: DateTime<Utc>,
    },
    /// Several properties were assigned in one batch.
    BatchApplied {
        /// Names of the changed properties.
        properties: Vec<String>,
        /// Timestamp of the batch.
        timestamp: DateTime<Utc>,
    },
}

impl ChangeEvent {
    /// Creates a [`ChangeEvent::PropertySet`] stamped with the current time.
    #[must_use]
    pub fn property_set(property: impl Into<String>) -> Self {
        Self::PropertySet {
            property: property.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a [`ChangeEvent::BatchApplied`] stamped with the current time.
    #[must_use]
    pub fn batch_applied(properties: Vec<String>) -> Self {
        Self::BatchApplied {
            properties,
            timestamp: Utc::now(),
        }
    }

    /// Returns the names of all properties touched by this event.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        match self {
            Self::PropertySet { property, .. } => std::slice::from_ref(property),
            Self::BatchApplied { properties, .. } => properties,
        }
    }

    /// Returns the event timestamp.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::PropertySet { timestamp, .. } | Self::BatchApplied { timestamp, .. } => {
                *timestamp
            }
        }
    }
}
