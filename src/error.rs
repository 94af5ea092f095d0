// src/error.rs
//! Error taxonomy for the chat service and its HTTP mapping.
//!
//! Operational errors (bad input, missing session, upstream model failures)
//! carry a message that is safe to return to the caller and are logged at
//! `warn`. Everything else is logged at `error` with full detail and answered
//! with a generic message; the detail is attached to the body only in debug
//! builds.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ErrorResponse;

/// Failures of the message store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt message record: {0}")]
    Corrupt(String),
}

/// Failures of a completion call, already classified.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("Failed to get a response from the language model")]
    Empty,
    #[error("Failed to generate response: {0}")]
    Upstream(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("Chat session {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    UpstreamEmpty(String),
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<GatewayError> for ChatError {
    fn from(e: GatewayError) -> Self {
        let message = e.to_string();
        match e {
            GatewayError::RateLimited => ChatError::RateLimited(message),
            GatewayError::Empty => ChatError::UpstreamEmpty(message),
            GatewayError::Upstream(_) => ChatError::Upstream(message),
        }
    }
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) => StatusCode::BAD_REQUEST,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::RateLimited(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::UpstreamEmpty(_) | ChatError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the message can be shown to the caller as-is.
    pub fn is_operational(&self) -> bool {
        !matches!(self, ChatError::Storage(_))
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = if self.is_operational() {
            tracing::warn!(status = %status.as_u16(), error = %self, "operational error");
            ErrorResponse {
                success: false,
                status: Some("error".to_string()),
                message: self.to_string(),
                detail: None,
            }
        } else {
            let error_id = Uuid::new_v4();
            tracing::error!(error_id = %error_id, error = ?self, "unhandled error occurred");
            ErrorResponse {
                success: false,
                status: Some("error".to_string()),
                message: "Internal Server Error".to_string(),
                detail: cfg!(debug_assertions).then(|| format!("{} (ID: {})", self, error_id)),
            }
        };

        (status, Json(body)).into_response()
    }
}
