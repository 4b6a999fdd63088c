//! Runtime configuration and its documented defaults.

use crate::fingerprint::DEFAULT_VOLATILE_FIELDS;
use serde::{Deserialize, Serialize};

/// Which document store backs the collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "memory" => Ok(Backend::Memory),
            _ => Err(crate::error::ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Every key is optional; missing keys keep their default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database name.
    pub db: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Exposed collection names, each mounted at `/api/<name>`.
    pub collections: Vec<String>,
    pub http_port: u16,
    /// Max request body, e.g. "256mb".
    pub post_size_limit: String,
    /// Fields ignored when comparing documents for duplicates.
    pub volatile_fields: Vec<String>,
    /// Also drop duplicates among members of the same ingestion batch.
    pub dedupe_within_batch: bool,
    pub backend: Backend,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db: "test".into(),
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: None,
            collections: vec!["users".into()],
            http_port: 9999,
            post_size_limit: "256mb".into(),
            volatile_fields: DEFAULT_VOLATILE_FIELDS.iter().map(|s| s.to_string()).collect(),
            dedupe_within_batch: false,
            backend: Backend::Postgres,
        }
    }
}
