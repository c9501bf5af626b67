//! Helpers over the JSON value representation used by the store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Shallow-merge `next` onto `prev`.
///
/// When both are objects the result holds every field of `prev`, with the
/// fields of `next` replacing same-named ones. Any other combination returns
/// `next` unchanged.
pub fn shallow_merge(prev: &Value, next: Value) -> Value {
    match (prev, next) {
        (Value::Object(prev), Value::Object(next)) => {
            let mut merged = prev.clone();
            merged.extend(next);
            Value::Object(merged)
        }
        (_, next) => next,
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(value: &Value) -> Result<T> {
    Ok(<T as serde::Deserialize>::deserialize(value)?)
}
