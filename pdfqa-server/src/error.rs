//! HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pdfqa_rag::RagError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request itself is malformed (missing files, bad multipart body).
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Rag(#[from] RagError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rag(e) => match e {
                RagError::ExtractionFailed { .. } | RagError::OcrFailed { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                RagError::CollectionNotFound(_) => StatusCode::NOT_FOUND,
                RagError::EmbeddingDimensionMismatch { .. }
                | RagError::DistanceMetricMismatch { .. }
                | RagError::CollectionCreateConflict(_) => StatusCode::CONFLICT,
                RagError::EmbeddingFailed { .. }
                | RagError::VectorStoreFailed { .. }
                | RagError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
                RagError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
