//! Duplicate suppression for ingestion batches.
//!
//! A batch member is kept only when no stored document has the same fingerprint. The store's
//! containment lookup narrows the candidates; equality is decided here. Checks run concurrently
//! (one task per member) and survivors keep their input order.

use crate::error::AppError;
use crate::fingerprint::{equivalent, VolatileFields};
use crate::store::SharedStore;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct DuplicateFilter {
    store: SharedStore,
    volatile: Arc<VolatileFields>,
    within_batch: bool,
}

impl DuplicateFilter {
    pub fn new(store: SharedStore, volatile: VolatileFields, within_batch: bool) -> Self {
        DuplicateFilter {
            store,
            volatile: Arc::new(volatile),
            within_batch,
        }
    }

    /// Members of `batch` whose fingerprint matches nothing in `collection`.
    /// Any failing existence check fails the whole call.
    pub async fn filter_new(&self, collection: &str, batch: Vec<Value>) -> Result<Vec<Value>, AppError> {
        tracing::debug!(collection = %collection, count = batch.len(), "checking batch for duplicates");
        let mut checks = Vec::with_capacity(batch.len());
        for doc in &batch {
            let store = self.store.clone();
            let volatile = self.volatile.clone();
            let collection = collection.to_string();
            let fingerprint = self.volatile.fingerprint(doc);
            checks.push(tokio::spawn(async move {
                let count = store.find_matching(&collection, &fingerprint).await.map(|candidates| {
                    candidates
                        .iter()
                        .filter(|c| equivalent(&volatile.fingerprint(c), &fingerprint))
                        .count()
                });
                (fingerprint, count)
            }));
        }

        let mut survivors = Vec::with_capacity(batch.len());
        let mut kept_fingerprints: Vec<Value> = Vec::new();
        for (doc, check) in batch.into_iter().zip(checks) {
            let (fingerprint, count) = check.await?;
            let count = count?;
            if count > 0 {
                tracing::debug!(fingerprint = %fingerprint, matches = count, "discarding duplicate");
                continue;
            }
            if self.within_batch {
                if kept_fingerprints.iter().any(|kept| equivalent(kept, &fingerprint)) {
                    tracing::debug!(fingerprint = %fingerprint, "discarding duplicate within batch");
                    continue;
                }
                kept_fingerprints.push(fingerprint);
            }
            survivors.push(doc);
        }
        Ok(survivors)
    }
}
