//! Collection handlers: list, get, ids, update, delete, bulk upsert, diff, CSV export.
//! Each handler is bound to one collection through its `CollectionService` state.

use crate::error::AppError;
use crate::extractors::NormalizedJson;
use crate::response::{csv_attachment, success};
use crate::service::{CollectionService, DiffFilter};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

/// GET /api/:name
pub async fn list(State(svc): State<CollectionService>) -> Result<impl IntoResponse, AppError> {
    Ok(success(svc.list().await?))
}

/// GET /api/:name/:id. Replies `null` for an unknown id.
pub async fn read(
    State(svc): State<CollectionService>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success(svc.get(&id).await?))
}

/// POST /api/:name/ids
pub async fn ids(State(svc): State<CollectionService>) -> Result<impl IntoResponse, AppError> {
    Ok(success(svc.ids().await?))
}

/// PUT /api/:name/:id with `{"doc": {...}}`.
pub async fn update(
    State(svc): State<CollectionService>,
    Path(id): Path<String>,
    NormalizedJson(body): NormalizedJson,
) -> Result<impl IntoResponse, AppError> {
    let patch = match body {
        Value::Object(mut map) => map.remove("doc"),
        _ => None,
    }
    .ok_or_else(|| AppError::BadRequest("update body must be {\"doc\": {...}}".into()))?;
    Ok(success(svc.update(&id, &patch).await?))
}

/// DELETE /api/:name/:id
pub async fn delete(
    State(svc): State<CollectionService>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success(svc.delete(&id).await?))
}

/// POST /api/:name with a document or an array of documents. Replies with generated ids.
pub async fn bulk_upsert(
    State(svc): State<CollectionService>,
    NormalizedJson(body): NormalizedJson,
) -> Result<impl IntoResponse, AppError> {
    Ok(success(svc.bulk_upsert(body).await?))
}

/// POST /api/:name/diff with `{}` or the ids the client already holds.
pub async fn diff(
    State(svc): State<CollectionService>,
    NormalizedJson(body): NormalizedJson,
) -> Result<impl IntoResponse, AppError> {
    let filter = DiffFilter::from_body(body)?;
    Ok(success(svc.diff(filter).await?))
}

/// GET /csv/:name
pub async fn export_csv(State(svc): State<CollectionService>) -> Result<impl IntoResponse, AppError> {
    let body = svc.export_csv().await?;
    Ok(csv_attachment(&format!("{}.csv", svc.name()), body))
}
