use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{KeyType, Snapshot};
use crate::error::{Error, Result};
use crate::value::{decode, shallow_merge};

/// Checks that a value has the shape of a key's bound type.
type Validator = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

/// Keyed container holding the current value of every slot.
///
/// Once a key is bound to a type, every committed or replaced value must
/// decode as that type, whichever handle wrote it. The store itself is not
/// synchronized; the engine wraps it in a lock and never holds that lock
/// while user code runs.
#[derive(Default)]
pub struct StateStore {
    values: HashMap<String, Value>,
    types: HashMap<String, KeyType>,
    validators: HashMap<String, Validator>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("values", &self.values)
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `initial` only if `key` is absent.
    ///
    /// Returns `true` if the value was inserted.
    pub fn create(&mut self, key: &str, initial: Value) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_owned(), initial);
        true
    }

    /// Get the current value of `key`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_owned()))
    }

    /// Get the current value of `key`, or `None` if it was never created.
    pub fn try_get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Overwrite the value of `key` without merging, returning the old value.
    ///
    /// Fails, leaving the slot untouched, if `value` does not fit the bound
    /// type of `key`.
    pub fn set(&mut self, key: &str, value: Value) -> Result<Option<Value>> {
        self.validate(key, &value)?;
        Ok(self.values.insert(key.to_owned(), value))
    }

    /// Commit a write: objects merge shallowly onto an object value, anything
    /// else replaces it. Returns the committed value.
    ///
    /// The merged result is checked against the bound type before the slot
    /// changes.
    pub fn commit(&mut self, key: &str, value: Value) -> Result<Value> {
        let previous = self
            .values
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_owned()))?;
        let merged = shallow_merge(previous, value);
        self.validate(key, &merged)?;
        self.values.insert(key.to_owned(), merged.clone());
        Ok(merged)
    }

    /// Check `value` against the bound type of `key`. Unbound keys accept
    /// anything.
    pub fn validate(&self, key: &str, value: &Value) -> Result<()> {
        match self.validators.get(key) {
            Some(validator) => validator(value),
            None => Ok(()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Point-in-time copy of all key/value pairs.
    pub fn snapshot(&self) -> Snapshot {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Record the value type of `key`, or verify it against the recorded one.
    ///
    /// The untyped view never registers and always passes.
    pub fn bind_type(&mut self, key: &str, ty: KeyType) -> Result<()> {
        if ty.is_untyped() {
            return Ok(());
        }
        match self.types.get(key) {
            Some(registered) => check(key, *registered, ty),
            None => {
                self.types.insert(key.to_owned(), ty);
                Ok(())
            }
        }
    }

    /// Bind `key` to `T`: record its type and a validator for its values.
    ///
    /// Fails if `key` is already bound to another type. Binding the untyped
    /// view is a no-op.
    pub fn bind<T: DeserializeOwned + 'static>(&mut self, key: &str) -> Result<()> {
        let ty = KeyType::of::<T>();
        self.bind_type(key, ty)?;
        if !ty.is_untyped() && !self.validators.contains_key(key) {
            let validator: Validator = Arc::new(|value: &Value| decode::<T>(value).map(drop));
            self.validators.insert(key.to_owned(), validator);
        }
        Ok(())
    }

    /// Verify `ty` against the recorded type of `key` without registering.
    pub fn check_type(&self, key: &str, ty: KeyType) -> Result<()> {
        if ty.is_untyped() {
            return Ok(());
        }
        match self.types.get(key) {
            Some(registered) => check(key, *registered, ty),
            None => Ok(()),
        }
    }
}

fn check(key: &str, registered: KeyType, requested: KeyType) -> Result<()> {
    if registered == requested {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            key: key.to_owned(),
            registered: registered.name(),
            requested: requested.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_create_get() {
        let mut store = StateStore::new();
        assert!(store.create("count", json!(0)));
        assert_eq!(store.get("count").unwrap(), &json!(0));
    }

    #[test]
    fn create_is_idempotent() {
        let mut store = StateStore::new();
        store.create("count", json!(1));
        assert!(!store.create("count", json!(2)));
        assert_eq!(store.get("count").unwrap(), &json!(1));
    }

    #[test]
    fn missing_key_is_an_error() {
        let store = StateStore::new();
        assert!(matches!(store.get("nope"), Err(Error::KeyNotFound(k)) if k == "nope"));
        assert!(store.try_get("nope").is_none());
    }

    #[test]
    fn commit_merges_objects_and_replaces_the_rest() {
        let mut store = StateStore::new();
        store.create("theme", json!({ "mode": "light", "accent": "blue" }));
        store.create("tags", json!(["a"]));

        let theme = store.commit("theme", json!({ "mode": "dark" })).unwrap();
        assert_eq!(theme, json!({ "mode": "dark", "accent": "blue" }));

        let tags = store.commit("tags", json!(["b", "c"])).unwrap();
        assert_eq!(tags, json!(["b", "c"]));
    }

    #[test]
    fn commit_requires_an_existing_key() {
        let mut store = StateStore::new();
        assert!(matches!(
            store.commit("ghost", json!(1)),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn set_overwrites() {
        let mut store = StateStore::new();
        store.create("theme", json!({ "mode": "light" }));
        let old = store.set("theme", json!({ "accent": "red" })).unwrap();
        assert_eq!(old, Some(json!({ "mode": "light" })));
        assert_eq!(store.get("theme").unwrap(), &json!({ "accent": "red" }));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut store = StateStore::new();
        store.create("a", json!(1));
        let snapshot = store.snapshot();
        store.set("a", json!(2)).unwrap();
        assert_eq!(snapshot.get("a"), Some(&json!(1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn type_registry() {
        let mut store = StateStore::new();
        store.bind_type("count", KeyType::of::<u32>()).unwrap();
        assert!(store.bind_type("count", KeyType::of::<u32>()).is_ok());
        assert!(store.check_type("count", KeyType::of::<Value>()).is_ok());
        assert!(matches!(
            store.check_type("count", KeyType::of::<String>()),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(store.check_type("unbound", KeyType::of::<String>()).is_ok());
    }

    #[derive(serde::Deserialize)]
    #[allow(dead_code)]
    struct Theme {
        mode: String,
        accent: String,
    }

    #[test]
    fn bound_key_rejects_values_of_another_shape() {
        let mut store = StateStore::new();
        store.bind::<u32>("count").unwrap();
        store.create("count", json!(1));

        assert!(matches!(
            store.commit("count", json!("oops")),
            Err(Error::Serialization(_))
        ));
        assert!(store.set("count", json!({ "n": 2 })).is_err());
        assert_eq!(store.get("count").unwrap(), &json!(1));
    }

    #[test]
    fn partial_object_is_checked_after_merging() {
        let mut store = StateStore::new();
        store.bind::<Theme>("theme").unwrap();
        store.create("theme", json!({ "mode": "light", "accent": "blue" }));

        let merged = store.commit("theme", json!({ "mode": "dark" })).unwrap();
        assert_eq!(merged, json!({ "mode": "dark", "accent": "blue" }));
        assert!(store.commit("theme", json!({ "mode": 3 })).is_err());
        assert_eq!(store.get("theme").unwrap()["mode"], "dark");
    }

    #[test]
    fn unbound_and_untyped_keys_accept_anything() {
        let mut store = StateStore::new();
        store.bind::<Value>("free").unwrap();
        store.create("free", json!(1));
        assert!(store.commit("free", json!("text")).is_ok());
        assert!(store.validate("never-bound", &json!(null)).is_ok());
    }
}
