//! Dashboard statistics handler.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use serde::Serialize;
use vaxtrack_core::DashboardStats;

/// Dashboard response.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub stats: DashboardStats,
}

/// GET /v1/dashboard - Aggregate statistics over all records.
///
/// Every call rescans the full record set; nothing is cached.
pub async fn get_dashboard(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<DashboardResponse>> {
    require_auth(&req)?;
    let stats = state.records.dashboard().await?;
    Ok(Json(DashboardResponse {
        success: true,
        stats,
    }))
}
