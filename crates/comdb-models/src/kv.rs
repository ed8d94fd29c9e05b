//! Data model for the log-structured key-value store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single log record. Immutable once appended; a later record with the
/// same key supersedes it, and a tombstone masks the key entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub sequence: u64,
    pub tombstone: bool,
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn put(sequence: u64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence,
            tombstone: false,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn tombstone(sequence: u64, key: impl Into<String>) -> Self {
        Self {
            sequence,
            tombstone: true,
            key: key.into(),
            value: String::new(),
        }
    }
}

/// Location of a key's latest record in the log.
///
/// Never persisted: the index is rebuilt from the log on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPointer {
    /// Byte offset of the record's frame in the log file.
    pub offset: u64,
    /// Framed length in bytes (header + payload).
    pub len: u32,
    pub sequence: u64,
}

/// One `(key, value)` match returned by a prefix query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Aggregate store counters served by `/bitcask/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Keys with a live (non-tombstoned) record.
    pub live_keys: u64,
    /// Total log file size in bytes.
    pub log_size_bytes: u64,
    /// Tombstone records currently in the log.
    pub tombstone_records: u64,
    /// Bytes held by superseded or tombstoned records, reclaimable by
    /// compaction.
    pub reclaimable_bytes: u64,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "live_keys: {}", self.live_keys)?;
        writeln!(f, "log_size_bytes: {}", self.log_size_bytes)?;
        writeln!(f, "tombstone_records: {}", self.tombstone_records)?;
        write!(f, "reclaimable_bytes: {}", self.reclaimable_bytes)
    }
}
