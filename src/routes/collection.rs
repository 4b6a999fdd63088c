//! Route set for one collection: `/api/<name>/...` plus `/csv/<name>`.

use crate::handlers::collection::{bulk_upsert, delete, diff, export_csv, ids, list, read, update};
use crate::service::CollectionService;
use axum::{
    routing::{get, post},
    Router,
};

pub fn collection_routes(service: CollectionService) -> Router {
    let base = format!("/api/{}", service.name());
    let csv = format!("/csv/{}", service.name());
    tracing::info!(collection = %service.name(), path = %base, "exposing collection");
    Router::new()
        .route(&base, get(list).post(bulk_upsert))
        .route(&format!("{}/ids", base), post(ids))
        .route(&format!("{}/diff", base), post(diff))
        .route(&format!("{}/:id", base), get(read).put(update).delete(delete))
        .route(&csv, get(export_csv))
        .with_state(service)
}
