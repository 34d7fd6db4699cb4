//! Property filter for a single persistence subscription.
//!
//! Tracks which property names a sync task watches and filters the change
//! events it receives from the bus.

use std::collections::HashSet;

use super::ChangeEvent;

/// Set of watched property names.
#[derive(Debug, Default, Clone)]
pub struct PropertyFilter {
    properties: HashSet<String>,
}

impl PropertyFilter {
    /// Creates a filter watching the given property names.
    #[must_use]
    pub fn new<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if `property` is watched.
    #[must_use]
    pub fn matches(&self, property: &str) -> bool {
        self.properties.contains(property)
    }

    /// Returns `true` if the event touches at least one watched property.
    #[must_use]
    pub fn touches(&self, event: &ChangeEvent) -> bool {
        event.properties().iter().any(|p| self.matches(p))
    }

    /// Returns the number of watched properties.
    #[must_use]
    pub fn count(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
