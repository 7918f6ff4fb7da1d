//! Health check handler.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub server: &'static str,
    pub version: &'static str,
}

/// GET /v1/health - Liveness plus store connectivity.
///
/// Unauthenticated so load balancers can probe it.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.store.health_check().await?;

    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok",
        timestamp,
        server: "vaxtrack",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
