//! Data model for the agent memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-agent memory space metadata. Created once via an explicit call;
/// every other memory operation requires it to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMeta {
    pub agent_id: String,
    /// Entry-count budget. Inserts beyond this are rejected until
    /// compression shrinks the set.
    pub total_size: u64,
    pub created_at: DateTime<Utc>,
}

/// One text entry in an agent's memory space, owned exclusively by its
/// [`MemoryMeta`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub content: String,
    pub sequence: u64,
    pub inserted_at: DateTime<Utc>,
}

/// A search result: an entry with its relevance score against the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredEntry {
    pub content: String,
    /// Relevance in `[0.0, 1.0]`, higher is more relevant.
    pub score: f64,
    pub sequence: u64,
}

/// Lifecycle of one compression job. `Succeeded` swaps the entry set;
/// `Failed` leaves stored state untouched. Retries are the caller's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Sent,
    Succeeded,
    Failed,
}

/// Result of a successful compression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOutcome {
    pub entries_before: u64,
    pub entries_after: u64,
}
