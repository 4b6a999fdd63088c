//! Document store abstraction. Routers and the duplicate filter only see `Arc<dyn DocumentStore>`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgDocumentStore};

use crate::error::StoreError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub type SharedStore = Arc<dyn DocumentStore>;

/// What to do when an inserted document's `id` already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conflict {
    /// Overwrite the stored document.
    Replace,
    /// Keep the stored document and count the insert as an error.
    Error,
}

/// Write summary returned by insert, update and delete.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WriteResult {
    pub inserted: u64,
    pub replaced: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
    /// Ids the store assigned to documents submitted without one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generated_keys: Vec<String>,
}

impl WriteResult {
    pub fn record_error(&mut self, message: String) {
        self.errors += 1;
        if self.first_error.is_none() {
            self.first_error = Some(message);
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    async fn create_collection(&self, name: &str) -> Result<(), StoreError>;

    async fn all(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// `{id}` projection of every document.
    async fn pluck_ids(&self, collection: &str) -> Result<Vec<Value>, StoreError>;

    /// Documents structurally containing `filter` (jsonb `@>`). Callers needing exact matches
    /// compare the candidates themselves.
    async fn find_matching(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, StoreError>;

    async fn insert(&self, collection: &str, docs: Vec<Value>, conflict: Conflict) -> Result<WriteResult, StoreError>;

    /// Recursively merge `patch` into the document with `id`.
    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<WriteResult, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<WriteResult, StoreError>;

    /// Every document whose `id` is not one of `ids`.
    async fn all_except(&self, collection: &str, ids: &[Value]) -> Result<Vec<Value>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Create `name` unless it is already listed. Returns true when created.
pub async fn ensure_collection(store: &dyn DocumentStore, name: &str) -> Result<bool, StoreError> {
    if store.list_collections().await?.iter().any(|c| c == name) {
        return Ok(false);
    }
    store.create_collection(name).await?;
    Ok(true)
}

/// The document's `id`, assigning a generated one (recorded in `generated_keys`) when absent or null.
pub(crate) fn assign_id(doc: &mut Map<String, Value>, result: &mut WriteResult) -> Value {
    match doc.get("id") {
        Some(id) if !id.is_null() => id.clone(),
        _ => {
            let key = uuid::Uuid::new_v4().to_string();
            doc.insert("id".into(), Value::String(key.clone()));
            result.generated_keys.push(key.clone());
            Value::String(key)
        }
    }
}

pub(crate) fn ensure_object(doc: &Value) -> Result<&Map<String, Value>, StoreError> {
    doc.as_object()
        .ok_or_else(|| StoreError::InvalidDocument(format!("expected an object, got {}", doc)))
}

/// Rejects patches that would rewrite the primary key of document `id`.
pub(crate) fn check_id_unchanged(id: &str, patch: &Map<String, Value>) -> Result<(), StoreError> {
    match patch.get("id") {
        None => Ok(()),
        Some(Value::String(s)) if s == id => Ok(()),
        Some(other) => Err(StoreError::PrimaryKeyChange {
            from: id.to_string(),
            to: other.to_string(),
        }),
    }
}
