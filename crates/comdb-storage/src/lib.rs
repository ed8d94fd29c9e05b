//! ComDB Storage - the server-side engine.
//!
//! Two independent stores share one append-log mechanism:
//!
//! - [`Bitcask`] - log-structured KV store with an ordered in-memory index,
//!   prefix queries, crash recovery, and compaction
//! - [`MemoryStore`] - per-agent bounded text memory with ranked
//!   [`SearchEngine`] lookup and an external [`Compressor`] pipeline
//!
//! The HTTP surface in `comdb-server` is one caller of this crate; the
//! engine has no transport dependencies of its own beyond the compression
//! upstream.

pub mod bitcask;
pub mod compressor;
pub mod log;
pub mod memory;
pub mod search;

use comdb_models::Result;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub use bitcask::Bitcask;
pub use compressor::{Compressor, HttpSummarizer, Summarizer};
pub use memory::MemoryStore;
pub use search::{Scorer, SearchEngine, TokenOverlapScorer};

/// Central storage manager that opens both stores under one data directory.
pub struct Storage {
    pub bitcask: Arc<Bitcask>,
    pub memory: Arc<MemoryStore>,
}

impl Storage {
    /// Open (or create) the data directory and both store logs inside it.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let bitcask = Arc::new(Bitcask::open(&dir.join("bitcask.log"))?);
        let memory = Arc::new(MemoryStore::open(&dir.join("memory.log"))?);
        Ok(Self { bitcask, memory })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_data_dir() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("comdb");

        let storage = Storage::open(&data_dir).unwrap();
        storage.bitcask.put("k", "v").unwrap();
        storage.memory.create_meta("a1", 3).unwrap();

        assert!(data_dir.join("bitcask.log").exists());
        assert!(data_dir.join("memory.log").exists());
    }

    #[test]
    fn test_stores_are_independent() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.bitcask.put("a1", "kv value").unwrap();
        storage.memory.create_meta("a1", 3).unwrap();
        storage.memory.set("a1", "memory value").unwrap();

        assert_eq!(storage.bitcask.get("a1").unwrap(), "kv value");
        assert_eq!(storage.memory.get("a1").unwrap()[0].content, "memory value");
    }
}
