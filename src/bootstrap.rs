//! Startup wiring: open the store, ensure each collection exists once, mount its routes.

use crate::config::{Backend, Config};
use crate::error::AppError;
use crate::fingerprint::VolatileFields;
use crate::routes::{collection_routes, common_routes_with_ready};
use crate::service::{CollectionService, DuplicateFilter};
use crate::state::AppState;
use crate::store::{ensure_collection, MemoryStore, PgDocumentStore, SharedStore};
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Store selected by `config.backend`. For PostgreSQL the database is created when missing.
pub async fn open_store(config: &Config) -> Result<SharedStore, AppError> {
    let store: SharedStore = match config.backend {
        Backend::Postgres => Arc::new(PgDocumentStore::connect(config).await?),
        Backend::Memory => {
            tracing::info!("using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Router exposing every configured collection plus the common routes.
/// Collections missing from the store are created here, before any request is served.
pub async fn build_app(config: &Config, store: SharedStore) -> Result<Router, AppError> {
    let limit = config.body_limit()?;
    let volatile = VolatileFields::new(config.volatile_fields.iter().cloned());
    let duplicates = DuplicateFilter::new(store.clone(), volatile, config.dedupe_within_batch);

    let mut app = common_routes_with_ready(AppState { store: store.clone() });
    for name in &config.collections {
        if ensure_collection(store.as_ref(), name).await? {
            tracing::info!(collection = %name, "created collection");
        }
        let service = CollectionService::new(name.clone(), store.clone(), duplicates.clone());
        app = app.merge(collection_routes(service));
    }

    Ok(app
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit)))
}

/// Open the store, build the router and serve on `config.http_port` until the process exits.
pub async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        db = %config.db,
        host = %config.host,
        port = config.port,
        collections = ?config.collections,
        http_port = config.http_port,
        post_size_limit = %config.post_size_limit,
        backend = ?config.backend,
        "using config"
    );
    let store = open_store(&config).await?;
    let app = build_app(&config, store).await?;
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
