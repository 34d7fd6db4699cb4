//! The persisted record: what is actually written under a storage key.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::reactive::ReactiveTarget;
use crate::utils::{is_object_typed, json_parse, observable_target_object};

/// JSON object of persisted property values.
///
/// Objects and arrays are stored as their JSON string. The optional
/// expiration lives under the reserved `__expires_at` key and is never
/// treated as a property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Moment after which the record is ignored at hydration.
    #[serde(
        rename = "__expires_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    /// Property name to stored value.
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl PersistedRecord {
    /// Captures the persistable subset of `properties` from `target`.
    pub fn capture<T, S>(target: &T, properties: &[S], expire_in: Option<Duration>) -> Self
    where
        T: ReactiveTarget + ?Sized,
        S: AsRef<str>,
    {
        let expires_at = expire_in.and_then(|lifetime| {
            TimeDelta::from_std(lifetime)
                .ok()
                .and_then(|delta| Utc::now().checked_add_signed(delta))
        });
        Self {
            expires_at,
            values: observable_target_object(target, properties),
        }
    }

    /// Decodes a stored record.
    ///
    /// # Errors
    ///
    /// Returns the decode error for malformed records (already logged).
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        json_parse(raw)
    }

    /// Encodes the record for storage.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if encoding fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns `true` if the record has an expiration at or before `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns the stored values restricted to `properties`.
    #[must_use]
    pub fn restricted_to<S: AsRef<str>>(&self, properties: &[S]) -> Map<String, Value> {
        properties
            .iter()
            .filter_map(|p| {
                let p = p.as_ref();
                self.values.get(p).map(|v| (p.to_string(), v.clone()))
            })
            .collect()
    }

    /// Returns the values to assign on `target` at hydration.
    ///
    /// Computed and unowned properties are skipped. Stored strings are
    /// decoded back into objects or arrays when the target currently holds
    /// an object or an array for that property.
    pub fn restorable<T, S>(&self, target: &T, properties: &[S]) -> Vec<(String, Value)>
    where
        T: ReactiveTarget + ?Sized,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for property in properties {
            let property = property.as_ref();
            if target.is_computed(property) || !target.has_own(property) {
                continue;
            }
            let Some(stored) = self.values.get(property) else {
                continue;
            };
            if let Some(value) = restore_value(target.get(property).as_ref(), stored) {
                out.push((property.to_string(), value));
            }
        }
        out
    }
}

/// Reverses the object flattening applied at extraction time.
fn restore_value(current: Option<&Value>, stored: &Value) -> Option<Value> {
    match (current, stored) {
        (Some(current), Value::String(encoded)) if is_object_typed(current) => {
            json_parse::<Value>(encoded).ok()
        }
        _ => Some(stored.clone()),
    }
}
