//! Operations on one exposed collection, independent of HTTP.

use crate::csv_export;
use crate::error::AppError;
use crate::normalize::{into_batch, normalize};
use crate::service::DuplicateFilter;
use crate::store::{Conflict, SharedStore, WriteResult};
use serde_json::Value;

/// Identifiers the client already holds; `diff` leaves those documents out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffFilter {
    pub exclude: Vec<Value>,
}

impl DiffFilter {
    /// An array of ids or `{"ids": [...]}`. `{}` normalizes to `[]` and so excludes nothing.
    pub fn from_body(body: Value) -> Result<Self, AppError> {
        match normalize(body) {
            Value::Array(exclude) => Ok(DiffFilter { exclude }),
            Value::Object(mut map) => match map.remove("ids") {
                Some(Value::Array(exclude)) if map.is_empty() => Ok(DiffFilter { exclude }),
                _ => Err(AppError::BadRequest(
                    "diff body must be {}, an array of ids, or {\"ids\": [...]}".into(),
                )),
            },
            other => Err(AppError::BadRequest(format!("diff body must be {{}} or an array of ids, got {}", other))),
        }
    }
}

/// Everything a router needs for one collection.
#[derive(Clone)]
pub struct CollectionService {
    name: String,
    store: SharedStore,
    duplicates: DuplicateFilter,
}

impl CollectionService {
    pub fn new(name: impl Into<String>, store: SharedStore, duplicates: DuplicateFilter) -> Self {
        CollectionService {
            name: name.into(),
            store,
            duplicates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn list(&self) -> Result<Vec<Value>, AppError> {
        Ok(self.store.all(&self.name).await?)
    }

    /// `None` when absent.
    pub async fn get(&self, id: &str) -> Result<Option<Value>, AppError> {
        Ok(self.store.get(&self.name, id).await?)
    }

    pub async fn ids(&self) -> Result<Vec<Value>, AppError> {
        Ok(self.store.pluck_ids(&self.name).await?)
    }

    pub async fn update(&self, id: &str, patch: &Value) -> Result<WriteResult, AppError> {
        if !patch.is_object() {
            return Err(AppError::BadRequest("update body must be {\"doc\": {...}}".into()));
        }
        Ok(self.store.update(&self.name, id, patch).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<WriteResult, AppError> {
        Ok(self.store.delete(&self.name, id).await?)
    }

    /// Normalize, drop documents already stored, upsert the rest.
    /// Returns only the ids the store generated.
    pub async fn bulk_upsert(&self, body: Value) -> Result<Vec<String>, AppError> {
        let batch = into_batch(body);
        if let Some(bad) = batch.iter().find(|d| !d.is_object()) {
            return Err(AppError::BadRequest(format!("every document must be a JSON object, got {}", bad)));
        }
        let received = batch.len();
        let docs = self.duplicates.filter_new(&self.name, batch).await?;
        if docs.is_empty() {
            tracing::debug!(collection = %self.name, received, "nothing new to insert");
            return Ok(Vec::new());
        }
        let result = self.store.insert(&self.name, docs, Conflict::Replace).await?;
        if let Some(err) = result.first_error {
            return Err(AppError::Insert(err));
        }
        tracing::debug!(
            collection = %self.name,
            received,
            inserted = result.inserted,
            replaced = result.replaced,
            unchanged = result.unchanged,
            "upserted"
        );
        Ok(result.generated_keys)
    }

    pub async fn diff(&self, filter: DiffFilter) -> Result<Vec<Value>, AppError> {
        if filter.exclude.is_empty() {
            return self.list().await;
        }
        Ok(self.store.all_except(&self.name, &filter.exclude).await?)
    }

    /// Whole collection as `;`-delimited CSV.
    pub async fn export_csv(&self) -> Result<String, AppError> {
        let docs = self.list().await?;
        csv_export::to_csv(&docs).map_err(|e| {
            tracing::warn!(collection = %self.name, error = %e, "csv export failed");
            AppError::from(e)
        })
    }
}
