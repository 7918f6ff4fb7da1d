//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use vaxtrack_store::StoreError;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Error code for programmatic handling.
    pub code: String,
    /// Structured context, e.g. the list of missing fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Core(#[from] vaxtrack_core::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => Self::NotFound(format!("{key} not found")),
            other => Self::Store(other),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Internal(_) => "internal_error",
            Self::Store(_) => "store_error",
            Self::Core(e) => match e {
                vaxtrack_core::Error::MissingFields(_)
                | vaxtrack_core::Error::InvalidCertId(_)
                | vaxtrack_core::Error::InvalidRecord(_) => "validation_error",
                vaxtrack_core::Error::GenerationExhausted { .. } => "generation_exhausted",
                vaxtrack_core::Error::Serialization(_) => "internal_error",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(e) => match e {
                vaxtrack_core::Error::MissingFields(_)
                | vaxtrack_core::Error::InvalidCertId(_)
                | vaxtrack_core::Error::InvalidRecord(_) => StatusCode::BAD_REQUEST,
                vaxtrack_core::Error::GenerationExhausted { .. }
                | vaxtrack_core::Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Structured details included in the response body.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Core(vaxtrack_core::Error::MissingFields(fields)) => {
                Some(serde_json::json!({ "missingFields": fields }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
