//! In-process document store. Same semantics as the PostgreSQL store; documents are kept in
//! insertion order. Used by tests and for running without a database.

use crate::error::StoreError;
use crate::fingerprint::{contains, equivalent, merge};
use crate::store::{assign_id, check_id_unchanged, ensure_object, Conflict, DocumentStore, WriteResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, collection: &str, f: impl FnOnce(&[Value]) -> T) -> Result<T, StoreError> {
        let guard = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        let docs = guard
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(f(docs.as_slice()))
    }

    fn write<T>(&self, collection: &str, f: impl FnOnce(&mut Vec<Value>) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut guard = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        let docs = guard
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        f(docs)
    }
}

fn has_id(doc: &Value, id: &Value) -> bool {
    doc.get("id") == Some(id)
}

fn position(docs: &[Value], id: &Value) -> Option<usize> {
    docs.iter().position(|d| has_id(d, id))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let guard = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.keys().cloned().collect())
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut guard = self.collections.write().map_err(|_| StoreError::Poisoned)?;
        guard.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        self.read(collection, |docs| docs.to_vec())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let id = Value::String(id.to_string());
        self.read(collection, |docs| docs.iter().find(|d| has_id(d, &id)).cloned())
    }

    async fn pluck_ids(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        self.read(collection, |docs| {
            docs.iter()
                .map(|d| json!({ "id": d.get("id").cloned().unwrap_or(Value::Null) }))
                .collect()
        })
    }

    async fn find_matching(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, StoreError> {
        self.read(collection, |docs| docs.iter().filter(|d| contains(d, filter)).cloned().collect())
    }

    async fn insert(&self, collection: &str, incoming: Vec<Value>, conflict: Conflict) -> Result<WriteResult, StoreError> {
        self.write(collection, |docs| {
            let mut result = WriteResult::default();
            for mut doc in incoming {
                let id = match doc.as_object_mut() {
                    Some(map) => assign_id(map, &mut result),
                    None => {
                        result.record_error(format!("expected an object, got {}", doc));
                        continue;
                    }
                };
                match (position(docs, &id), conflict) {
                    (None, _) => {
                        docs.push(doc);
                        result.inserted += 1;
                    }
                    (Some(i), Conflict::Replace) => {
                        if docs[i] == doc {
                            result.unchanged += 1;
                        } else {
                            docs[i] = doc;
                            result.replaced += 1;
                        }
                    }
                    (Some(_), Conflict::Error) => {
                        result.record_error(format!("duplicate primary key `id`: {}", id));
                    }
                }
            }
            Ok(result)
        })
    }

    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<WriteResult, StoreError> {
        let patch = ensure_object(patch)?;
        let key = Value::String(id.to_string());
        self.write(collection, |docs| {
            let mut result = WriteResult::default();
            let Some(Value::Object(doc)) = docs.iter_mut().find(|d| has_id(d, &key)) else {
                result.skipped += 1;
                return Ok(result);
            };
            check_id_unchanged(id, patch)?;
            let before = doc.clone();
            merge(doc, patch);
            if *doc == before {
                result.unchanged += 1;
            } else {
                result.replaced += 1;
            }
            Ok(result)
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<WriteResult, StoreError> {
        let key = Value::String(id.to_string());
        self.write(collection, |docs| {
            let mut result = WriteResult::default();
            match position(docs, &key) {
                Some(i) => {
                    docs.remove(i);
                    result.deleted = 1;
                }
                None => result.skipped = 1,
            }
            Ok(result)
        })
    }

    async fn all_except(&self, collection: &str, ids: &[Value]) -> Result<Vec<Value>, StoreError> {
        self.read(collection, |docs| {
            docs.iter()
                .filter(|d| {
                    let id = d.get("id").unwrap_or(&Value::Null);
                    !ids.iter().any(|excluded| equivalent(id, excluded))
                })
                .cloned()
                .collect()
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _guard = self.collections.read().map_err(|_| StoreError::Poisoned)?;
        Ok(())
    }
}
