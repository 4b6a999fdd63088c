//! JSON body extractor that repairs array-shaped objects before handlers see them.

use crate::error::AppError;
use crate::normalize::normalize;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde_json::Value;

/// Any JSON value (not only objects or arrays), passed through [`normalize`].
/// Parse failures and oversized bodies are rejected with the standard error envelope.
#[derive(Clone, Debug)]
pub struct NormalizedJson(pub Value);

#[async_trait]
impl<S> FromRequest<S> for NormalizedJson
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        Ok(NormalizedJson(normalize(value)))
    }
}
