//! Shared helpers: API-shape selection, JSON decoding, key enumeration and
//! property extraction.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::reactive::{ReactiveApi, ReactiveTarget};

/// Picks one of two equivalent implementations by the configured API shape.
///
/// `modern` is returned for [`ReactiveApi::Modern`], `legacy` otherwise.
pub fn select_api<A>(api: ReactiveApi, modern: A, legacy: A) -> A {
    match api {
        ReactiveApi::Modern => modern,
        ReactiveApi::Legacy => legacy,
    }
}

/// Decodes `json` into `T`.
///
/// Never panics. On failure the input and the error are logged at warn
/// level and the error is returned; callers usually map it to "no data".
///
/// # Errors
///
/// Returns the [`serde_json::Error`] describing why decoding failed.
pub fn json_parse<T: DeserializeOwned>(json: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(json).inspect_err(|error| {
        tracing::warn!(json, %error, "json parse error");
    })
}

/// Returns the top-level keys of a value that serializes to a JSON object.
///
/// Anything else (scalars, arrays, unserializable values) yields no keys.
pub fn object_keys<T: Serialize + ?Sized>(value: &T) -> Vec<String> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map.into_iter().map(|(k, _)| k).collect(),
        _ => Vec::new(),
    }
}

/// Returns `true` for values stored as their JSON string form.
#[must_use]
pub fn is_object_typed(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Extracts the persistable subset of `properties` from `target`.
///
/// - computed properties are skipped with a warning;
/// - non-observable properties are included with a warning (their later
///   changes are not observed);
/// - properties the target does not own are omitted;
/// - objects and arrays are replaced by their JSON string.
pub fn observable_target_object<T, S>(target: &T, properties: &[S]) -> Map<String, Value>
where
    T: ReactiveTarget + ?Sized,
    S: AsRef<str>,
{
    let mut record = Map::new();
    for property in properties {
        let property = property.as_ref();

        if target.is_computed(property) {
            tracing::warn!(property, "property is computed and will not persist");
            continue;
        }
        if !target.is_observable(property) {
            tracing::warn!(
                property,
                "property is not observable and not affected by reactions, but will persist"
            );
        }

        if !target.has_own(property) {
            continue;
        }
        let Some(value) = target.get(property) else {
            continue;
        };
        let value = if is_object_typed(&value) {
            Value::String(value.to_string())
        } else {
            value
        };
        record.insert(property.to_string(), value);
    }
    record
}
