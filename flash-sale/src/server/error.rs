//! Error type for HTTP handlers.
//!
//! Bridges domain errors to JSON error responses by implementing Axum's
//! `IntoResponse`.

use crate::error::SaleError;
use crate::identity::IdentityError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<User>, AppError> {
///     let user = registry.user(&id).ok_or_else(|| AppError::not_found("User not found"))?;
///     Ok(Json(user))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Validation details (user-facing)
    details: Vec<String>,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String) -> Self {
        Self {
            status,
            message,
            details: Vec::new(),
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }

    /// Create a 400 validation error listing what was wrong.
    #[must_use]
    pub fn validation(details: Vec<String>) -> Self {
        Self {
            details,
            ..Self::bad_request("Validation error")
        }
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message.into())
    }

    /// Create a 429 Too Many Requests error.
    #[must_use]
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message.into())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }

    /// HTTP status of the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            success: false,
            message: self.message,
            details: self.details,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<SaleError> for AppError {
    fn from(err: SaleError) -> Self {
        Self::internal("Internal server error").with_source(err.into())
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        Self::validation(vec![err.to_string()])
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        Self::bad_request("Invalid JSON format")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[400] Invalid input");
    }

    #[test]
    fn test_identity_error_is_validation() {
        let err = AppError::from(IdentityError::MissingUserId);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Validation error");
        assert_eq!(err.details, vec!["\"userId\" is required".to_string()]);
    }

    #[test]
    fn test_sale_error_is_internal() {
        let err = AppError::from(SaleError::Uninitialized);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
        assert!(std::error::Error::source(&err).is_some());
    }
}
