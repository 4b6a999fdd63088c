//! Array normalization for request bodies.
//!
//! Some clients serialize arrays as objects keyed by position:
//! `{ "0": {"name": "a"}, "1": {"name": "b"} }` instead of `[{"name": "a"}, {"name": "b"}]`.
//! Such "sequence-shaped" objects are turned back into proper arrays before route logic runs.

use serde_json::{Map, Value};

/// True when every own key of `value`, in enumeration order, equals its zero-based position.
/// An empty object is vacuously sequence-shaped. Non-objects (arrays included) are not.
pub fn is_sequence_shaped(value: &Value) -> bool {
    match value {
        Value::Object(map) => map_is_sequence_shaped(map),
        _ => false,
    }
}

fn map_is_sequence_shaped(map: &Map<String, Value>) -> bool {
    map.keys().enumerate().all(|(i, k)| *k == i.to_string())
}

/// Returns a proper array when `value` is sequence-shaped, otherwise `value` unchanged.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) if map_is_sequence_shaped(&map) => {
            Value::Array(map.into_iter().map(|(_, v)| v).collect())
        }
        other => other,
    }
}

/// Normalize and view the result as a batch: arrays yield their elements, anything else is a
/// batch of one.
pub fn into_batch(value: Value) -> Vec<Value> {
    match normalize(value) {
        Value::Array(items) => items,
        single => vec![single],
    }
}
