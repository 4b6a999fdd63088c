//! Document fingerprints: the projection used to decide whether two documents are the same record.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Fields stripped before comparing documents unless configured otherwise.
pub const DEFAULT_VOLATILE_FIELDS: &[&str] = &["_id", "id", "created_at", "gps", "reporter", "price"];

/// Set of field names removed (at every nesting level) when fingerprinting.
#[derive(Clone, Debug)]
pub struct VolatileFields {
    names: HashSet<String>,
}

impl Default for VolatileFields {
    fn default() -> Self {
        Self::new(DEFAULT_VOLATILE_FIELDS.iter().map(|s| s.to_string()))
    }
}

impl VolatileFields {
    pub fn new<I: IntoIterator<Item = String>>(names: I) -> Self {
        VolatileFields {
            names: names.into_iter().collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Copy of `doc` with every volatile key removed, recursing into nested objects and arrays.
    pub fn fingerprint(&self, doc: &Value) -> Value {
        match doc {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| !self.contains(k))
                    .map(|(k, v)| (k.clone(), self.fingerprint(v)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.fingerprint(v)).collect()),
            other => other.clone(),
        }
    }
}

/// Structural containment, same rules as PostgreSQL `jsonb @>`:
/// objects contain every key of the filter with a containing value, arrays contain each filter
/// element somewhere, scalars compare equal.
pub fn contains(doc: &Value, filter: &Value) -> bool {
    match (doc, filter) {
        (Value::Object(d), Value::Object(f)) => f
            .iter()
            .all(|(k, fv)| d.get(k).map(|dv| contains(dv, fv)).unwrap_or(false)),
        (Value::Array(d), Value::Array(f)) => f.iter().all(|fv| d.iter().any(|dv| contains(dv, fv))),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => doc == filter,
    }
}

/// Structural equality with numbers compared by value (`1` equals `1.0`).
/// Objects need the same key set, arrays the same elements in the same order.
pub fn equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len() && x.iter().all(|(k, xv)| y.get(k).map(|yv| equivalent(xv, yv)).unwrap_or(false))
        }
        (Value::Array(x), Value::Array(y)) => x.len() == y.len() && x.iter().zip(y).all(|(xv, yv)| equivalent(xv, yv)),
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Recursive merge of `patch` into `target`: nested objects merge key by key, anything else replaces.
pub fn merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (k, pv) in patch {
        match (target.get_mut(k), pv) {
            (Some(Value::Object(tv)), Value::Object(pm)) => merge(tv, pm),
            _ => {
                target.insert(k.clone(), pv.clone());
            }
        }
    }
}
