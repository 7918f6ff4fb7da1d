//! Vaccination record handlers.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::read_json;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vaxtrack_core::{CertId, RecordPayload, VaccinationRecord};

/// Registration response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub cert_id: CertId,
    pub record: VaccinationRecord,
}

/// Single record response.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub record: VaccinationRecord,
}

/// Record list response.
#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    pub success: bool,
    pub records: Vec<VaccinationRecord>,
}

/// Response carrying only a message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Bulk import request. `records` is checked by hand so that a non-array
/// value gets a specific error.
#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    #[serde(default)]
    pub records: Value,
}

/// Bulk import response.
#[derive(Debug, Serialize)]
pub struct BulkImportResponse {
    pub success: bool,
    pub message: String,
    pub inserted: usize,
    pub errors: usize,
}

/// POST /v1/vaccinations - Register a vaccination.
pub async fn create_record(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    require_auth(&req)?;
    let payload: RecordPayload = read_json(req, state.max_body_bytes()).await?;

    let record = state.records.register(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            cert_id: record.cert_id.clone(),
            record,
        }),
    ))
}

/// GET /v1/vaccinations/{cert_id} - Look up a record.
pub async fn get_record(
    State(state): State<AppState>,
    Path(cert_id): Path<String>,
    req: Request,
) -> ApiResult<Json<RecordResponse>> {
    require_auth(&req)?;
    let record = state.records.get(&cert_id).await?;
    Ok(Json(RecordResponse {
        success: true,
        record,
    }))
}

/// GET /v1/vaccinations - List every record.
pub async fn list_records(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<RecordListResponse>> {
    require_auth(&req)?;
    let records = state.records.list().await?;
    Ok(Json(RecordListResponse {
        success: true,
        records,
    }))
}

/// DELETE /v1/vaccinations/{cert_id} - Delete a record.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(cert_id): Path<String>,
    req: Request,
) -> ApiResult<Json<MessageResponse>> {
    require_auth(&req)?;
    state.records.delete(&cert_id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Record deleted successfully".to_string(),
    }))
}

/// POST /v1/vaccinations/bulk - Import records that already carry IDs.
pub async fn bulk_import(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<BulkImportResponse>> {
    require_auth(&req)?;
    let body: BulkImportRequest = read_json(req, state.max_body_bytes()).await?;

    let Value::Array(records) = body.records else {
        return Err(ApiError::Validation("Records must be an array".to_string()));
    };

    let summary = state.records.import(records).await;
    Ok(Json(BulkImportResponse {
        success: true,
        message: summary.message(),
        inserted: summary.inserted,
        errors: summary.errors,
    }))
}
