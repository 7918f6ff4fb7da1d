//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use axum::extract::Request;
use serde::de::DeserializeOwned;

/// Read the request body as JSON, rejecting bodies over `limit` bytes.
pub async fn read_json<T: DeserializeOwned>(req: Request, limit: usize) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), limit)
        .await
        .map_err(|e| ApiError::Validation(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Validation(format!("invalid JSON: {e}")))
}
