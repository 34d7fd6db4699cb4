//! Minimal reactive object implementing [`ReactiveTarget`].
//!
//! [`ObservableObject`] stores named JSON values. Each property is declared
//! as observable (assignments publish a [`ChangeEvent`]), plain (assignments
//! are silent), or computed (derived from the other fields, read-only).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::{ChangeBus, ChangeEvent, ReactiveTarget, change_bus};
use crate::error::PersistError;
use crate::utils::object_keys;

/// Derivation function of a computed property.
type ComputeFn = Arc<dyn Fn(&Fields<'_>) -> Value + Send + Sync>;

/// Storage slot of one property.
#[derive(Clone)]
enum Slot {
    Observable(Value),
    Plain(Value),
    Computed(ComputeFn),
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observable(v) => f.debug_tuple("Observable").field(v).finish(),
            Self::Plain(v) => f.debug_tuple("Plain").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Read-only view of the stored (non-computed) fields, handed to
/// computed property functions.
#[derive(Debug)]
pub struct Fields<'a> {
    slots: &'a BTreeMap<String, Slot>,
}

impl Fields<'_> {
    /// Returns the stored value of an observable or plain property.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        match self.slots.get(property)? {
            Slot::Observable(v) | Slot::Plain(v) => Some(v),
            Slot::Computed(_) => None,
        }
    }

    /// Returns the stored value as `f64`, or `0.0` if absent or not numeric.
    #[must_use]
    pub fn number(&self, property: &str) -> f64 {
        self.get(property).and_then(Value::as_f64).unwrap_or(0.0)
    }
}

/// Builder for [`ObservableObject`].
#[derive(Debug, Default)]
pub struct ObservableObjectBuilder {
    slots: BTreeMap<String, Slot>,
    capacity: Option<usize>,
}

impl ObservableObjectBuilder {
    /// Declares an observable property.
    #[must_use]
    pub fn observable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.slots.insert(name.into(), Slot::Observable(value));
        self
    }

    /// Declares a plain property: persisted if requested, never observed.
    #[must_use]
    pub fn plain(mut self, name: impl Into<String>, value: Value) -> Self {
        self.slots.insert(name.into(), Slot::Plain(value));
        self
    }

    /// Declares a computed property derived from the stored fields.
    #[must_use]
    pub fn computed<F>(mut self, name: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&Fields<'_>) -> Value + Send + Sync + 'static,
    {
        self.slots.insert(name.into(), Slot::Computed(Arc::new(derive)));
        self
    }

    /// Sets the change bus capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Builds the object.
    #[must_use]
    pub fn build(self) -> ObservableObject {
        ObservableObject {
            slots: RwLock::new(self.slots),
            bus: ChangeBus::new(self.capacity.unwrap_or(change_bus::DEFAULT_CAPACITY)),
        }
    }
}

/// A thread-safe bag of named properties with change notification.
#[derive(Debug)]
pub struct ObservableObject {
    slots: RwLock<BTreeMap<String, Slot>>,
    bus: ChangeBus,
}

impl ObservableObject {
    /// Starts declaring a new object.
    #[must_use]
    pub fn builder() -> ObservableObjectBuilder {
        ObservableObjectBuilder::default()
    }

    /// Builds an object whose every top-level key of `value` is observable.
    ///
    /// Values that do not serialize to a JSON object yield an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Json`] if `value` cannot be serialized.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, PersistError> {
        let json = serde_json::to_value(value)?;
        let mut builder = Self::builder();
        for key in object_keys(&json) {
            if let Some(field) = json.get(&key) {
                builder = builder.observable(key, field.clone());
            }
        }
        Ok(builder.build())
    }

    /// Returns the change bus of this object.
    #[must_use]
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Returns every property (computed ones evaluated) as a JSON object.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let fields = Fields { slots: &slots };
        slots
            .iter()
            .map(|(name, slot)| (name.clone(), read_slot(slot, &fields)))
            .collect()
    }

    /// Assigns under the write lock. Returns `true` if an observable
    /// property actually changed.
    fn assign(
        slots: &mut BTreeMap<String, Slot>,
        property: &str,
        value: Value,
    ) -> Result<bool, PersistError> {
        match slots.get_mut(property) {
            Some(Slot::Computed(_)) => Err(PersistError::ReadOnlyProperty(property.to_string())),
            Some(Slot::Observable(current)) => {
                if *current == value {
                    return Ok(false);
                }
                *current = value;
                Ok(true)
            }
            Some(Slot::Plain(current)) => {
                *current = value;
                Ok(false)
            }
            None => {
                slots.insert(property.to_string(), Slot::Plain(value));
                Ok(false)
            }
        }
    }
}

fn read_slot(slot: &Slot, fields: &Fields<'_>) -> Value {
    match slot {
        Slot::Observable(v) | Slot::Plain(v) => v.clone(),
        Slot::Computed(derive) => derive(fields),
    }
}

impl ReactiveTarget for ObservableObject {
    fn is_observable(&self, property: &str) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        matches!(slots.get(property), Some(Slot::Observable(_)))
    }

    fn is_computed(&self, property: &str) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        matches!(slots.get(property), Some(Slot::Computed(_)))
    }

    fn has_own(&self, property: &str) -> bool {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.contains_key(property)
    }

    fn get(&self, property: &str) -> Option<Value> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let fields = Fields { slots: &slots };
        slots.get(property).map(|slot| read_slot(slot, &fields))
    }

    fn set(&self, property: &str, value: Value) -> Result<(), PersistError> {
        let changed = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            Self::assign(&mut slots, property, value)?
        };
        if changed {
            let _ = self.bus.publish(ChangeEvent::property_set(property));
        }
        Ok(())
    }

    fn apply(&self, values: Vec<(String, Value)>) -> Result<(), PersistError> {
        let mut changed = Vec::new();
        {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            if let Some((name, _)) = values
                .iter()
                .find(|(name, _)| matches!(slots.get(name), Some(Slot::Computed(_))))
            {
                return Err(PersistError::ReadOnlyProperty(name.clone()));
            }
            for (property, value) in values {
                if Self::assign(&mut slots, &property, value)? {
                    changed.push(property);
                }
            }
        }
        if !changed.is_empty() {
            let _ = self.bus.publish(ChangeEvent::batch_applied(changed));
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.keys().cloned().collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.bus.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    fn cart() -> ObservableObject {
        ObservableObject::builder()
            .observable("price", json!(10))
            .observable("quantity", json!(2))
            .plain("note", json!("gift"))
            .computed("total", |f| json!(f.number("price") * f.number("quantity")))
            .build()
    }

    #[test]
    fn metadata_predicates() {
        let obj = cart();
        assert!(obj.is_observable("price"));
        assert!(!obj.is_observable("note"));
        assert!(!obj.is_observable("total"));
        assert!(obj.is_computed("total"));
        assert!(!obj.is_computed("price"));
        assert!(obj.has_own("note"));
        assert!(!obj.has_own("missing"));
    }

    #[test]
    fn computed_reads_current_fields() {
        let obj = cart();
        assert_eq!(obj.get("total"), Some(json!(20.0)));
        assert!(obj.set("quantity", json!(3)).is_ok());
        assert_eq!(obj.get("total"), Some(json!(30.0)));
    }

    #[test]
    fn observable_set_publishes_event() {
        let obj = cart();
        let mut rx = obj.subscribe();
        assert!(obj.set("price", json!(11)).is_ok());
        let Ok(event) = rx.try_recv() else {
            panic!("expected change event");
        };
        assert_eq!(event.properties(), ["price".to_string()]);
    }

    #[test]
    fn unchanged_value_publishes_nothing() {
        let obj = cart();
        let mut rx = obj.subscribe();
        assert!(obj.set("price", json!(10)).is_ok());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn plain_set_is_silent() {
        let obj = cart();
        let mut rx = obj.subscribe();
        assert!(obj.set("note", json!("urgent")).is_ok());
        assert_eq!(obj.get("note"), Some(json!("urgent")));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn computed_set_is_rejected() {
        let obj = cart();
        let Err(PersistError::ReadOnlyProperty(name)) = obj.set("total", json!(1)) else {
            panic!("expected read-only error");
        };
        assert_eq!(name, "total");
    }

    #[test]
    fn unknown_set_adds_plain_property() {
        let obj = cart();
        assert!(obj.set("extra", json!(true)).is_ok());
        assert!(obj.has_own("extra"));
        assert!(!obj.is_observable("extra"));
    }

    #[test]
    fn apply_publishes_one_batch() {
        let obj = cart();
        let mut rx = obj.subscribe();
        let values = vec![
            ("price".to_string(), json!(5)),
            ("quantity".to_string(), json!(2)),
            ("note".to_string(), json!("x")),
        ];
        assert!(obj.apply(values).is_ok());
        let Ok(event) = rx.try_recv() else {
            panic!("expected batch event");
        };
        // quantity did not change and note is plain
        assert_eq!(event.properties(), ["price".to_string()]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn apply_rejects_computed_without_mutating() {
        let obj = cart();
        let values = vec![
            ("price".to_string(), json!(99)),
            ("total".to_string(), json!(1)),
        ];
        assert!(obj.apply(values).is_err());
        assert_eq!(obj.get("price"), Some(json!(10)));
    }

    #[test]
    fn from_serializable_makes_keys_observable() {
        #[derive(Serialize)]
        struct Settings {
            theme: String,
            font_size: u32,
        }
        let settings = Settings {
            theme: "dark".to_string(),
            font_size: 14,
        };
        let Ok(obj) = ObservableObject::from_serializable(&settings) else {
            panic!("serializable struct");
        };
        assert_eq!(obj.keys(), vec!["font_size".to_string(), "theme".to_string()]);
        assert!(obj.is_observable("theme"));
        assert_eq!(obj.get("font_size"), Some(json!(14)));
    }

    #[test]
    fn snapshot_includes_computed() {
        let obj = cart();
        let snap = obj.snapshot();
        assert_eq!(snap.get("total"), Some(&json!(20.0)));
        assert_eq!(snap.len(), 4);
    }
}
