//! PostgreSQL-backed document store. One table per collection: `id JSONB PRIMARY KEY, doc JSONB`.
//! The full document (including `id`) lives in `doc`; `id` is duplicated into its own column for keyed access.

use crate::config::{is_valid_collection_name, Config};
use crate::error::StoreError;
use crate::fingerprint::merge;
use crate::store::{assign_id, check_id_unchanged, ensure_object, Conflict, DocumentStore, WriteResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};

/// Document store over a sqlx pool. Cheap to clone.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

fn connect_options(config: &Config) -> PgConnectOptions {
    let opts = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user);
    match &config.password {
        Some(p) => opts.password(p),
        None => opts,
    }
}

impl PgDocumentStore {
    /// Ensure `config.db` exists (creating it through the `postgres` admin database), then open the pool.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let opts = connect_options(config);
        if ensure_database_exists(&opts, &config.db).await? {
            tracing::info!(db = %config.db, "created database");
        } else {
            tracing::info!(db = %config.db, "using database");
        }
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(opts.database(&config.db))
            .await?;
        Ok(PgDocumentStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgDocumentStore { pool }
    }
}

/// Create database `db_name` if it does not exist. Returns true when it was created.
pub async fn ensure_database_exists(opts: &PgConnectOptions, db_name: &str) -> Result<bool, StoreError> {
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(false);
    }
    let mut conn: sqlx::PgConnection = opts.clone().database("postgres").connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(db_name)
        .fetch_one(&mut conn)
        .await?;
    if exists.0 {
        return Ok(false);
    }
    sqlx::query(&format!("CREATE DATABASE {}", quote_ident(db_name)))
        .execute(&mut conn)
        .await?;
    Ok(true)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table(collection: &str) -> Result<String, StoreError> {
    if !is_valid_collection_name(collection) {
        return Err(StoreError::InvalidCollection(collection.to_string()));
    }
    Ok(quote_ident(collection))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = current_schema()",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id JSONB PRIMARY KEY,
                doc JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            table(name)?
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn all(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let sql = format!("SELECT doc FROM {} ORDER BY created_at, id", table(collection)?);
        tracing::debug!(sql = %sql, "query");
        Ok(sqlx::query_scalar::<_, Value>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE id = to_jsonb($1::text)", table(collection)?);
        tracing::debug!(sql = %sql, id = %id, "query");
        Ok(sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn pluck_ids(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        let sql = format!(
            "SELECT jsonb_build_object('id', id) FROM {} ORDER BY created_at, id",
            table(collection)?
        );
        tracing::debug!(sql = %sql, "query");
        Ok(sqlx::query_scalar::<_, Value>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find_matching(&self, collection: &str, filter: &Value) -> Result<Vec<Value>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE doc @> $1 ORDER BY created_at, id", table(collection)?);
        tracing::debug!(sql = %sql, filter = %filter, "query");
        Ok(sqlx::query_scalar::<_, Value>(&sql)
            .bind(filter)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert(&self, collection: &str, docs: Vec<Value>, conflict: Conflict) -> Result<WriteResult, StoreError> {
        let t = table(collection)?;
        let on_conflict = match conflict {
            Conflict::Replace => {
                format!("DO UPDATE SET doc = EXCLUDED.doc WHERE {t}.doc IS DISTINCT FROM EXCLUDED.doc")
            }
            Conflict::Error => "DO NOTHING".to_string(),
        };
        // xmax = 0 only for freshly inserted rows; no row back means unchanged or rejected.
        let sql = format!(
            "INSERT INTO {t} (id, doc) VALUES ($1, $2) ON CONFLICT (id) {on_conflict} RETURNING (xmax = 0)"
        );
        tracing::debug!(sql = %sql, count = docs.len(), "query (tx)");

        let mut result = WriteResult::default();
        let mut tx = self.pool.begin().await?;
        for mut doc in docs {
            let id = match doc.as_object_mut() {
                Some(map) => assign_id(map, &mut result),
                None => {
                    result.record_error(format!("expected an object, got {}", doc));
                    continue;
                }
            };
            let row: Option<bool> = sqlx::query_scalar(&sql)
                .bind(&id)
                .bind(&doc)
                .fetch_optional(&mut *tx)
                .await?;
            match (row, conflict) {
                (Some(true), _) => result.inserted += 1,
                (Some(false), _) => result.replaced += 1,
                (None, Conflict::Replace) => result.unchanged += 1,
                (None, Conflict::Error) => result.record_error(format!("duplicate primary key `id`: {}", id)),
            }
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<WriteResult, StoreError> {
        let t = table(collection)?;
        let patch = ensure_object(patch)?;
        let mut result = WriteResult::default();
        let mut tx = self.pool.begin().await?;
        let current: Option<Value> =
            sqlx::query_scalar(&format!("SELECT doc FROM {t} WHERE id = to_jsonb($1::text) FOR UPDATE"))
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(Value::Object(mut doc)) = current else {
            result.skipped += 1;
            return Ok(result);
        };
        check_id_unchanged(id, patch)?;
        let before = doc.clone();
        merge(&mut doc, patch);
        if doc == before {
            result.unchanged += 1;
        } else {
            sqlx::query(&format!("UPDATE {t} SET doc = $2 WHERE id = to_jsonb($1::text)"))
                .bind(id)
                .bind(Value::Object(doc))
                .execute(&mut *tx)
                .await?;
            result.replaced += 1;
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<WriteResult, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = to_jsonb($1::text)", table(collection)?);
        tracing::debug!(sql = %sql, id = %id, "query");
        let done = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        let mut result = WriteResult::default();
        if done.rows_affected() == 0 {
            result.skipped = 1;
        } else {
            result.deleted = done.rows_affected();
        }
        Ok(result)
    }

    async fn all_except(&self, collection: &str, ids: &[Value]) -> Result<Vec<Value>, StoreError> {
        let sql = format!(
            "SELECT doc FROM {} WHERE NOT ($1::jsonb @> jsonb_build_array(id)) ORDER BY created_at, id",
            table(collection)?
        );
        tracing::debug!(sql = %sql, excluded = ids.len(), "query");
        Ok(sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Array(ids.to_vec()))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}
