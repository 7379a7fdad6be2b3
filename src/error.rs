//! Error handling module
//!
//! Defines the application error taxonomy and its HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Table, column or session absent
    #[error("not found: {0}")]
    NotFound(String),

    /// No declared or inferable relationship between two tables
    #[error("ambiguous join: {0}")]
    AmbiguousJoin(String),

    /// Non-read statement submitted to the executor
    #[error("forbidden operation: {0}")]
    ForbiddenOperation(String),

    /// Malformed or execution-failed statement
    #[error("query failed: {0}")]
    Query(String),

    /// Knowledge index unreachable
    #[error("knowledge retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Session store unreachable; fatal for the interaction
    #[error("session store unavailable: {0}")]
    SessionUnavailable(String),

    /// Unknown model provider tag
    #[error("unsupported model provider: {0}")]
    UnsupportedProvider(String),

    /// Input validation failure
    #[error("validation failed: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::RetrievalUnavailable(e.to_string())
    }
}

#[cfg(feature = "surrealdb")]
impl From<surrealdb::Error> for AppError {
    fn from(e: surrealdb::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();
        let body = Json(ErrorResponse::new(&code, &self.to_string()));
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
            .into_response()
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub code: String,
    /// Error message
    pub message: String,
    /// Details
    pub details: Option<String>,
    /// Request ID
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            details: None,
            request_id: None,
        }
    }

    /// Attach details
    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    /// Attach a request ID
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

/// HTTP status mapping
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::NotFound(_) => (404, "NOT_FOUND".to_string()),
            AppError::AmbiguousJoin(_) => (409, "AMBIGUOUS_JOIN".to_string()),
            AppError::ForbiddenOperation(_) => (403, "FORBIDDEN_OPERATION".to_string()),
            AppError::Query(_) => (422, "QUERY_ERROR".to_string()),
            AppError::RetrievalUnavailable(_) => (503, "RETRIEVAL_UNAVAILABLE".to_string()),
            AppError::SessionUnavailable(_) => (503, "SESSION_UNAVAILABLE".to_string()),
            AppError::UnsupportedProvider(_) => (400, "UNSUPPORTED_PROVIDER".to_string()),
            AppError::Validation(_) => (400, "BAD_REQUEST".to_string()),
            AppError::Config(_) => (500, "CONFIG_ERROR".to_string()),
            AppError::Database(_) => (500, "INTERNAL_ERROR".to_string()),
            _ => (500, "INTERNAL_ERROR".to_string()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let (status, code) = (&AppError::NotFound("DIM_STORE".into())).into();
        assert_eq!(status, 404);
        assert_eq!(code, "NOT_FOUND");

        let (status, _) = (&AppError::ForbiddenOperation("DELETE".into())).into();
        assert_eq!(status, 403);

        let (status, _) = (&AppError::SessionUnavailable("down".into())).into();
        assert_eq!(status, 503);
    }

    #[test]
    fn test_error_response_builder() {
        let resp = ErrorResponse::new("QUERY_ERROR", "syntax error")
            .with_details("near LIMIT")
            .with_request_id("req-1");
        assert_eq!(resp.code, "QUERY_ERROR");
        assert_eq!(resp.details.as_deref(), Some("near LIMIT"));
        assert_eq!(resp.request_id.as_deref(), Some("req-1"));
    }
}
