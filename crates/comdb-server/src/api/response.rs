//! Mapping from engine errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use comdb_models::StoreError;

/// An engine error carried to the wire: status code plus a human-readable
/// message. No error kind is silently swallowed.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let status = match &error {
            StoreError::KeyNotFound(_) | StoreError::AgentNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::AgentExists(_) => StatusCode::CONFLICT,
            StoreError::CapacityExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            StoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
            StoreError::Storage(_) | StoreError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(status = %self.status, message = %self.message, "request failed");
        (self.status, self.message).into_response()
    }
}
