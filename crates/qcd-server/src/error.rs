//! The HTTP error envelope (spec §7): every handler failure is mapped
//! through [`qcd_core::ErrorCode`] into the same `{ "error": { ... } }`
//! shape, carrying the request id the logging middleware assigned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use qcd_core::ErrorCode;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ErrorBody,
}

/// A typed API failure. Every route handler returns this as its `Err` arm
/// so the envelope shape and status-code mapping live in exactly one place.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestions: Vec<String>,
    pub request_id: String,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        tracing::warn!(
            code = self.code.as_str(),
            request_id = self.request_id,
            message = self.message,
            "request failed"
        );
        let body = ApiErrorBody {
            error: ErrorBody {
                code: self.code.as_str(),
                message: self.message,
                suggestions: self.suggestions,
                timestamp: Utc::now(),
                request_id: self.request_id,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Maps a database failure to the DATABASE_ERROR code with a generic
/// message — the details go to the logs, never the response body.
pub fn db_error(err: impl std::fmt::Display, request_id: &str) -> ApiError {
    tracing::error!(request_id, error = %err, "database operation failed");
    ApiError::new(
        ErrorCode::DatabaseError,
        "a database error occurred while processing the request",
        request_id,
    )
    .with_suggestions(vec!["try again shortly".to_string()])
}
