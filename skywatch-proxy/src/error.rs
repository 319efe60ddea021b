//! HTTP error responses
//!
//! Every failure is reported as `{"error": "<code>"}` with a stable code
//! clients can switch on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::aggregator::AggregateError;
use crate::sources::SourceId;
use crate::upstream::FetchError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// A directly queried source failed (502)
    #[error("{source_id} failed: {error}")]
    Source { source_id: SourceId, error: String },

    /// Every aggregated source failed (502)
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Unparseable `bbox` parameter (400)
    #[error("Invalid bbox: {0}")]
    InvalidBbox(String),

    /// Unknown source name in `sources` (400)
    #[error("Invalid sources: {0}")]
    InvalidSources(String),
}

impl ApiError {
    pub fn source_failed(source_id: SourceId, error: impl std::fmt::Display) -> Self {
        ApiError::Source {
            source_id,
            error: error.to_string(),
        }
    }

    pub fn fetch(source_id: SourceId, error: FetchError) -> Self {
        Self::source_failed(source_id, error)
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Source { source_id, .. } => source_id.error_code(),
            ApiError::Aggregate(_) => "aggregate_failed",
            ApiError::InvalidBbox(_) => "invalid_bbox",
            ApiError::InvalidSources(_) => "invalid_sources",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Source { .. } | ApiError::Aggregate(_) => StatusCode::BAD_GATEWAY,
            ApiError::InvalidBbox(_) | ApiError::InvalidSources(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Rejected request");
        }

        (status, Json(json!({ "error": self.code() }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
