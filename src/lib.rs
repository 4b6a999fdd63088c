//! Schema-less document collections over REST: CRUD, deduplicating bulk upsert, diff and CSV export
//! for every configured collection.

pub mod bootstrap;
pub mod config;
pub mod csv_export;
pub mod error;
pub mod extractors;
pub mod fingerprint;
pub mod handlers;
pub mod normalize;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use bootstrap::{build_app, open_store, serve};
pub use config::{Backend, Config};
pub use error::{AppError, ConfigError, StoreError};
pub use normalize::{is_sequence_shaped, normalize};
pub use response::{error_response, success};
pub use routes::{collection_routes, common_routes_with_ready};
pub use service::{CollectionService, DiffFilter, DuplicateFilter};
pub use state::AppState;
pub use store::{Conflict, DocumentStore, MemoryStore, PgDocumentStore, SharedStore, WriteResult};
