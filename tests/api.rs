//! End-to-end tests of the HTTP surface over the in-memory store.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use doc_rest::{
    build_app, collection_routes, common_routes_with_ready, AppState, CollectionService, Config, Conflict, DocumentStore, DuplicateFilter, MemoryStore,
    SharedStore, StoreError, WriteResult,
};
use doc_rest::fingerprint::VolatileFields;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app_with(store: SharedStore) -> Router {
    let config = Config::merged(json!({
        "backend": "memory",
        "collections": ["users", "brand"],
        "post_size_limit": "1kb"
    }))
    .unwrap();
    build_app(&config, store).await.unwrap()
}

async fn app() -> Router {
    app_with(Arc::new(MemoryStore::new())).await
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, method, uri, body.map(|b| b.to_string())).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn send_raw(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

fn ids_of(docs: &Value) -> Vec<Value> {
    docs.as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].clone())
        .collect()
}

#[tokio::test]
async fn array_shaped_object_is_ingested_as_batch() {
    let app = app().await;
    let body = json!({ "0": { "name": "ALB1" }, "1": { "name": "ALB2" }, "2": { "name": "ALB3" } });
    let (status, ids) = send(&app, "POST", "/api/users", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids.as_array().unwrap().len(), 3);

    let (_, docs) = send(&app, "GET", "/api/users", None).await;
    let names: Vec<&str> = docs.as_array().unwrap().iter().map(|d| d["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["ALB1", "ALB2", "ALB3"]);
}

#[tokio::test]
async fn resubmitting_a_document_creates_nothing() {
    let app = app().await;
    let (_, first) = send(&app, "POST", "/api/users", Some(json!([{ "name": "A" }]))).await;
    assert_eq!(first.as_array().unwrap().len(), 1);

    let (status, second) = send(&app, "POST", "/api/users", Some(json!([{ "name": "A" }]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, json!([]));

    let (_, docs) = send(&app, "GET", "/api/users", None).await;
    assert_eq!(docs.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn volatile_fields_do_not_distinguish_documents() {
    let app = app().await;
    send(&app, "POST", "/api/users", Some(json!({ "name": "A", "price": 1, "created_at": "x" }))).await;

    let (_, ids) = send(&app, "POST", "/api/users", Some(json!({ "name": "A", "price": 2, "created_at": "y" }))).await;
    assert_eq!(ids, json!([]));

    let (_, ids) = send(&app, "POST", "/api/users", Some(json!({ "name": "A", "color": "red" }))).await;
    assert_eq!(ids.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn partial_or_reordered_documents_are_not_duplicates() {
    let app = app().await;
    send(&app, "POST", "/api/users", Some(json!({ "name": "A", "size": 2, "tags": ["x", "y"] }))).await;

    let (_, ids) = send(
        &app,
        "POST",
        "/api/users",
        Some(json!([{ "name": "A" }, { "name": "A", "size": 2, "tags": ["y", "x"] }])),
    )
    .await;
    assert_eq!(ids.as_array().unwrap().len(), 2);

    let (_, ids) = send(&app, "POST", "/api/users", Some(json!({ "id": "fresh", "price": 4 }))).await;
    assert_eq!(ids, json!([]));
    let (_, doc) = send(&app, "GET", "/api/users/fresh", None).await;
    assert_eq!(doc, json!({ "id": "fresh", "price": 4 }));

    let (_, docs) = send(&app, "GET", "/api/users", None).await;
    assert_eq!(docs.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn client_supplied_ids_are_not_reported() {
    let app = app().await;
    let (status, ids) = send(
        &app,
        "POST",
        "/api/brand",
        Some(json!([{ "id": "b5", "name": "b5" }, { "name": "b6" }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids = ids.as_array().unwrap();
    assert_eq!(ids.len(), 1);
    assert_ne!(ids[0], json!("b5"));
}

#[tokio::test]
async fn diff_returns_documents_the_client_lacks() {
    let app = app().await;
    let docs = json!([
        { "id": 1, "name": "one" },
        { "id": 2, "name": "two" },
        { "id": 3, "name": "three" },
        { "id": 4, "name": "four" }
    ]);
    send(&app, "POST", "/api/brand", Some(docs)).await;

    let (status, rest) = send(&app, "POST", "/api/brand/diff", Some(json!([1, 3]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids_of(&rest), vec![json!(2), json!(4)]);

    let (_, all) = send(&app, "POST", "/api/brand/diff", Some(json!({}))).await;
    assert_eq!(all.as_array().unwrap().len(), 4);

    let (_, all) = send(&app, "POST", "/api/brand/diff", Some(json!([]))).await;
    assert_eq!(all.as_array().unwrap().len(), 4);

    let (_, rest) = send(&app, "POST", "/api/brand/diff", Some(json!({ "ids": [1, 2, 3] }))).await;
    assert_eq!(ids_of(&rest), vec![json!(4)]);

    let (status, body) = send(&app, "POST", "/api/brand/diff", Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn crud_round_trip() {
    let app = app().await;
    let (_, ids) = send(&app, "POST", "/api/users", Some(json!({ "name": "bob", "age": 1 }))).await;
    let id = ids[0].as_str().unwrap().to_string();
    let path = format!("/api/users/{}", id);

    let (status, doc) = send(&app, "GET", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc, json!({ "name": "bob", "age": 1, "id": id }));

    let (status, result) = send(&app, "PUT", &path, Some(json!({ "doc": { "age": 2 } }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["replaced"], 1);

    let (_, doc) = send(&app, "GET", &path, None).await;
    assert_eq!(doc["age"], 2);
    assert_eq!(doc["name"], "bob");

    let (_, listed) = send(&app, "POST", "/api/users/ids", None).await;
    assert_eq!(listed, json!([{ "id": id }]));

    let (status, result) = send(&app, "DELETE", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["deleted"], 1);

    let (status, doc) = send(&app, "GET", &path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(doc, Value::Null);
}

#[tokio::test]
async fn update_edge_cases() {
    let app = app().await;
    let (status, result) = send(&app, "PUT", "/api/users/missing", Some(json!({ "doc": { "a": 1 } }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["skipped"], 1);

    let (status, body) = send(&app, "PUT", "/api/users/missing", Some(json!({ "a": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    send(&app, "POST", "/api/users", Some(json!({ "id": "u1", "name": "x" }))).await;
    let (status, body) = send(&app, "PUT", "/api/users/u1", Some(json!({ "doc": { "id": "u2" } }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("primary key"));
}

#[tokio::test]
async fn csv_export_of_empty_collection() {
    let app = app().await;
    let (status, headers, body) = send_raw(&app, "GET", "/csv/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert!(headers[header::CONTENT_DISPOSITION].to_str().unwrap().starts_with("attachment"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn csv_export_flattens_nested_fields() {
    let app = app().await;
    send(
        &app,
        "POST",
        "/api/brand",
        Some(json!([
            { "id": "a", "shop": { "city": "X" }, "n": 1 },
            { "id": "b", "n": 2 }
        ])),
    )
    .await;
    let (_, _, body) = send_raw(&app, "GET", "/csv/brand", None).await;
    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec![r#""id";"shop.city";"n""#, r#""a";"X";1"#, r#""b";"n/a";2"#]);
}

#[tokio::test]
async fn concurrent_upserts_of_same_document() {
    let app = app().await;
    let doc = json!({ "id": "same", "name": "x" });
    let (a, b) = tokio::join!(
        send(&app, "POST", "/api/users", Some(doc.clone())),
        send(&app, "POST", "/api/users", Some(doc.clone()))
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    let (_, docs) = send(&app, "GET", "/api/users", None).await;
    assert_eq!(ids_of(&docs), vec![json!("same")]);
}

#[tokio::test]
async fn malformed_and_oversized_bodies_are_rejected() {
    let app = app().await;
    let (status, _, body) = send_raw(&app, "POST", "/api/users", Some("{not json".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].is_string());

    let big = json!({ "blob": "x".repeat(4096) });
    let (status, _, _) = send_raw(&app, "POST", "/api/users", Some(big.to_string())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, body) = send(&app, "POST", "/api/users", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unconfigured_collection_is_not_routed() {
    let app = app().await;
    let (status, _, _) = send_raw(&app, "GET", "/api/orders", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn common_routes() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "ok");
}

#[tokio::test]
async fn configured_collections_are_created_once() {
    let store = Arc::new(MemoryStore::new());
    store.create_collection("users").await.unwrap();
    store
        .insert("users", vec![json!({ "id": "keep" })], Conflict::Replace)
        .await
        .unwrap();
    let app = app_with(store.clone()).await;

    let mut names = store.list_collections().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["brand", "users"]);

    let (_, docs) = send(&app, "GET", "/api/users", None).await;
    assert_eq!(ids_of(&docs), vec![json!("keep")]);
}

/// Store whose every operation fails.
struct BrokenStore;

#[async_trait]
impl DocumentStore for BrokenStore {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn create_collection(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
    async fn all(&self, c: &str) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn get(&self, c: &str, _: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn pluck_ids(&self, c: &str) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn find_matching(&self, c: &str, _: &Value) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn insert(&self, c: &str, _: Vec<Value>, _: Conflict) -> Result<WriteResult, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn update(&self, c: &str, _: &str, _: &Value) -> Result<WriteResult, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn delete(&self, c: &str, _: &str) -> Result<WriteResult, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn all_except(&self, c: &str, _: &[Value]) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::UnknownCollection(c.into()))
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
}

#[tokio::test]
async fn store_failures_become_500_with_error_envelope() {
    let store: SharedStore = Arc::new(BrokenStore);
    let filter = DuplicateFilter::new(store.clone(), VolatileFields::default(), false);
    let app = collection_routes(CollectionService::new("users", store, filter));

    for (method, uri, body) in [
        ("GET", "/api/users", None),
        ("GET", "/api/users/x", None),
        ("POST", "/api/users/ids", None),
        ("DELETE", "/api/users/x", None),
        ("POST", "/api/users", Some(json!({ "name": "a" }))),
        ("POST", "/api/users/diff", Some(json!([1]))),
        ("GET", "/csv/users", None),
    ] {
        let (status, body) = send(&app, method, uri, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{} {}", method, uri);
        assert!(body["error"].as_str().unwrap().contains("users"), "{} {}", method, uri);
    }
}

#[tokio::test]
async fn ready_reports_unavailable_store() {
    let app = common_routes_with_ready(AppState { store: Arc::new(BrokenStore) });
    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "status": "degraded", "store": "unavailable" }));
}
