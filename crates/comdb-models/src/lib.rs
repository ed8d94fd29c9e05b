//! Shared model and error primitives for ComDB.
//!
//! Both stores, the HTTP surface, and the client SDK speak in terms of these
//! types. Keeping them in one leaf crate avoids circular dependencies between
//! the engine and the server.

pub mod error;
pub mod kv;
pub mod memory;

pub use error::{Result, StoreError};
pub use kv::{KeyValue, Record, RecordPointer, StoreStats};
pub use memory::{CompressionOutcome, JobState, MemoryEntry, MemoryMeta, ScoredEntry};
