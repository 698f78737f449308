//! HTTP handlers.
//!
//! Thin translation between JSON requests and the [`FlashSale`](crate::service::FlashSale)
//! and [`IdentityRegistry`](crate::identity::IdentityRegistry) operations.

use serde::Serialize;

/// Authentication endpoints
pub mod auth;
/// Sale endpoints
pub mod sale;

/// Standard success envelope: `{ "success": true, "message"?: ..., "data"?: ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded
    pub success: bool,
    /// Optional human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Optional payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    #[must_use]
    pub const fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Attach a message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Successful response with only a message
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}
