//! Error types for the client SDK.

use thiserror::Error;

/// Client error types. Transport failures and non-2xx API replies are kept
/// apart so callers can tell a dead server from a rejected request.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
