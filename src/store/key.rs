use serde_json::Value;
use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed name for one slot of shared state.
///
/// The type parameter ties every read and write through this key to one value
/// type. `StateKey<serde_json::Value>` is the untyped view and may address any
/// key regardless of how it was created.
///
/// # Examples
///
/// ```
/// use keystate::StateKey;
///
/// let counter: StateKey<u32> = StateKey::new("counter");
/// assert_eq!(counter.name(), "counter");
/// ```
pub struct StateKey<T> {
    name: Arc<str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateKey<T> {
    /// Create a key with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// The key name, used verbatim as the storage entry name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateKey")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// Runtime identity of a key's value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyType {
    id: TypeId,
    name: &'static str,
}

impl KeyType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this is the untyped `serde_json::Value` view.
    pub fn is_untyped(&self) -> bool {
        self.id == TypeId::of::<Value>()
    }
}
