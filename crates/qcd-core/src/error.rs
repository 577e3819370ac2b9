//! The error taxonomy codes shared across the query pipeline and the HTTP
//! surface (spec §7). Each variant maps to exactly one HTTP status in
//! `qcd-server`'s `ApiError::into_response`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    ProductNotFound,
    QueryProcessingError,
    InvalidQueryError,
    DatabaseError,
    ConfigurationError,
    RateLimitError,
    RequestTooLarge,
    UnsupportedMediaType,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::ProductNotFound => "product_not_found",
            ErrorCode::QueryProcessingError => "query_processing_error",
            ErrorCode::InvalidQueryError => "invalid_query_error",
            ErrorCode::DatabaseError => "database_error",
            ErrorCode::ConfigurationError => "configuration_error",
            ErrorCode::RateLimitError => "rate_limit_error",
            ErrorCode::RequestTooLarge => "request_too_large",
            ErrorCode::UnsupportedMediaType => "unsupported_media_type",
            ErrorCode::InternalError => "internal_error",
        }
    }

    /// The conventional HTTP status for this code, per spec §7's table.
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::ValidationError => 400,
            ErrorCode::ProductNotFound => 404,
            ErrorCode::QueryProcessingError | ErrorCode::InternalError => 500,
            ErrorCode::InvalidQueryError => 400,
            ErrorCode::DatabaseError => 503,
            ErrorCode::ConfigurationError => 500,
            ErrorCode::RateLimitError => 429,
            ErrorCode::RequestTooLarge => 413,
            ErrorCode::UnsupportedMediaType => 415,
        }
    }
}
