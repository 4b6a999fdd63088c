//! Load config: defaults, then an optional JSON file, then environment overrides.

use crate::config::types::{Backend, Config};
use crate::config::validator::{is_valid_collection_name, parse_size_limit};
use crate::error::ConfigError;
use serde_json::Value;

/// Env var naming a JSON config file.
pub const CONFIG_PATH_ENV: &str = "DOC_REST_CONFIG";

impl Config {
    /// Merge supplied keys over the defaults. Keys absent from `overrides` keep their default.
    pub fn merged(overrides: Value) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_value(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// `.env`, then the file named by `DOC_REST_CONFIG` (if set), then `DOC_REST_*` / `PG*` env vars.
    pub fn load() -> Result<Config, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str(&text)?
            }
            Err(_) => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("DOC_REST_DB") {
            self.db = v;
        }
        if let Some(v) = var("DOC_REST_HOST") {
            self.host = v;
        }
        if let Some(v) = var("DOC_REST_PORT") {
            self.port = v.parse().map_err(|_| ConfigError::InvalidValue { key: "port", value: v })?;
        }
        if let Some(v) = var("DOC_REST_COLLECTIONS") {
            self.collections = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = var("DOC_REST_HTTP_PORT") {
            self.http_port = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "http_port", value: v })?;
        }
        if let Some(v) = var("DOC_REST_POST_SIZE_LIMIT") {
            self.post_size_limit = v;
        }
        if let Some(v) = var("DOC_REST_BACKEND") {
            self.backend = v.parse::<Backend>()?;
        }
        if let Some(v) = var("PGUSER") {
            self.user = v;
        }
        if let Some(v) = var("PGPASSWORD") {
            self.password = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_size_limit(&self.post_size_limit)?;
        if let Some(bad) = self.collections.iter().find(|c| !is_valid_collection_name(c)) {
            return Err(ConfigError::InvalidValue {
                key: "collections",
                value: bad.clone(),
            });
        }
        Ok(())
    }

    /// Body size limit in bytes.
    pub fn body_limit(&self) -> Result<usize, ConfigError> {
        parse_size_limit(&self.post_size_limit)
    }
}
