//! Error types shared across the ComDB engine and its callers.

use thiserror::Error;

/// Storage and memory engine error types.
///
/// Every fallible operation in the engine returns one of these kinds; the
/// HTTP layer maps them onto status codes (404, 409, 413, 500, 502) and a
/// human-readable message.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent already exists: {0}")]
    AgentExists(String),

    #[error("memory capacity exceeded for agent {agent_id}: limit is {limit} entries")]
    CapacityExceeded { agent_id: String, limit: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("upstream summarizer error: {0}")]
    Upstream(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, StoreError>;
