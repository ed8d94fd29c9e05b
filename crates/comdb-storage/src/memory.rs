//! Agent memory store.
//!
//! Each agent owns a bounded set of text entries under a [`MemoryMeta`]
//! created by an explicit call. Entries live in memory and are persisted
//! through the same append-log mechanism as the KV store, with a record per
//! mutation replayed on startup:
//!
//! - `CreateMeta` - a new agent memory space
//! - `Append` - one entry added
//! - `ReplaceAll` - the entry set swapped by compression
//! - `RegisterCompressor` - a summarizer endpoint registered for the agent
//!
//! Capacity policy: once an agent holds `total_size` entries, further
//! inserts fail with `CapacityExceeded` until compression shrinks the set.
//! Inserts never trigger compression themselves.

use crate::log::{self, LogReplay, LogWriter};
use chrono::Utc;
use comdb_models::{CompressionOutcome, MemoryEntry, MemoryMeta, Result, StoreError};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
enum MemoryRecord {
    CreateMeta(MemoryMeta),
    Append {
        agent_id: String,
        entry: MemoryEntry,
    },
    ReplaceAll {
        agent_id: String,
        entries: Vec<MemoryEntry>,
    },
    RegisterCompressor {
        agent_id: String,
        endpoint: String,
    },
}

#[derive(Debug)]
struct AgentSpace {
    meta: MemoryMeta,
    entries: Vec<MemoryEntry>,
    compressor: Option<String>,
    next_sequence: u64,
}

impl AgentSpace {
    fn new(meta: MemoryMeta) -> Self {
        Self {
            meta,
            entries: Vec::new(),
            compressor: None,
            next_sequence: 1,
        }
    }
}

/// Per-agent bounded memory store, shared behind an `Arc`.
pub struct MemoryStore {
    writer: Mutex<LogWriter>,
    state: RwLock<HashMap<String, AgentSpace>>,
}

impl MemoryStore {
    /// Open the store at `path`, replaying its log.
    pub fn open(path: &Path) -> Result<Self> {
        let mut state: HashMap<String, AgentSpace> = HashMap::new();

        let mut replay = LogReplay::open(path)?;
        while let Some((_, _, payload)) = replay.next_frame() {
            match log::decode::<MemoryRecord>(&payload)? {
                MemoryRecord::CreateMeta(meta) => {
                    state.insert(meta.agent_id.clone(), AgentSpace::new(meta));
                }
                MemoryRecord::Append { agent_id, entry } => {
                    if let Some(space) = state.get_mut(&agent_id) {
                        space.next_sequence = space.next_sequence.max(entry.sequence + 1);
                        space.entries.push(entry);
                    } else {
                        tracing::warn!(agent_id = %agent_id, "memory log entry for unknown agent, skipping");
                    }
                }
                MemoryRecord::ReplaceAll { agent_id, entries } => {
                    if let Some(space) = state.get_mut(&agent_id) {
                        let top = entries.iter().map(|e| e.sequence).max().unwrap_or(0);
                        space.next_sequence = space.next_sequence.max(top + 1);
                        space.entries = entries;
                    }
                }
                MemoryRecord::RegisterCompressor { agent_id, endpoint } => {
                    if let Some(space) = state.get_mut(&agent_id) {
                        space.compressor = Some(endpoint);
                    }
                }
            }
        }
        if replay.truncated_tail() {
            tracing::warn!(
                path = %path.display(),
                valid_len = replay.valid_len(),
                "discarding torn tail of memory log"
            );
            log::truncate_to(path, replay.valid_len())?;
        }
        drop(replay);

        Ok(Self {
            writer: Mutex::new(LogWriter::open(path)?),
            state: RwLock::new(state),
        })
    }

    /// Create the memory space for `agent_id` with an entry-count budget of
    /// `total_size`. Fails with `AgentExists` on a duplicate.
    pub fn create_meta(&self, agent_id: &str, total_size: u64) -> Result<MemoryMeta> {
        let mut writer = self.writer.lock();
        if self.state.read().contains_key(agent_id) {
            return Err(StoreError::AgentExists(agent_id.to_string()));
        }
        let meta = MemoryMeta {
            agent_id: agent_id.to_string(),
            total_size,
            created_at: Utc::now(),
        };
        let payload = log::encode(&MemoryRecord::CreateMeta(meta.clone()))?;
        writer.append(&payload)?;
        self.state
            .write()
            .insert(agent_id.to_string(), AgentSpace::new(meta.clone()));
        tracing::debug!(agent_id, total_size, "created agent memory space");
        Ok(meta)
    }

    /// Append one entry to an agent's memory.
    ///
    /// Rejects with `CapacityExceeded` once the agent holds `total_size`
    /// entries; compression is the only way to shrink the set again.
    pub fn set(&self, agent_id: &str, content: &str) -> Result<MemoryEntry> {
        let mut writer = self.writer.lock();
        let entry = {
            let state = self.state.read();
            let space = state
                .get(agent_id)
                .ok_or_else(|| StoreError::AgentNotFound(agent_id.to_string()))?;
            if space.entries.len() as u64 >= space.meta.total_size {
                return Err(StoreError::CapacityExceeded {
                    agent_id: agent_id.to_string(),
                    limit: space.meta.total_size,
                });
            }
            MemoryEntry {
                content: content.to_string(),
                sequence: space.next_sequence,
                inserted_at: Utc::now(),
            }
        };
        let payload = log::encode(&MemoryRecord::Append {
            agent_id: agent_id.to_string(),
            entry: entry.clone(),
        })?;
        writer.append(&payload)?;

        let mut state = self.state.write();
        if let Some(space) = state.get_mut(agent_id) {
            space.next_sequence = entry.sequence + 1;
            space.entries.push(entry.clone());
        }
        Ok(entry)
    }

    /// All entries for `agent_id` in insertion order.
    pub fn get(&self, agent_id: &str) -> Result<Vec<MemoryEntry>> {
        let state = self.state.read();
        let space = state
            .get(agent_id)
            .ok_or_else(|| StoreError::AgentNotFound(agent_id.to_string()))?;
        Ok(space.entries.clone())
    }

    /// A page of entries in insertion order. Large memory sets should be
    /// fetched this way rather than all at once.
    pub fn get_page(&self, agent_id: &str, offset: usize, limit: usize) -> Result<Vec<MemoryEntry>> {
        let state = self.state.read();
        let space = state
            .get(agent_id)
            .ok_or_else(|| StoreError::AgentNotFound(agent_id.to_string()))?;
        Ok(space
            .entries
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn meta(&self, agent_id: &str) -> Result<MemoryMeta> {
        let state = self.state.read();
        let space = state
            .get(agent_id)
            .ok_or_else(|| StoreError::AgentNotFound(agent_id.to_string()))?;
        Ok(space.meta.clone())
    }

    /// Register `endpoint` as the compression backend for `agent_id`.
    pub fn register_compressor(&self, agent_id: &str, endpoint: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        if !self.state.read().contains_key(agent_id) {
            return Err(StoreError::AgentNotFound(agent_id.to_string()));
        }
        let payload = log::encode(&MemoryRecord::RegisterCompressor {
            agent_id: agent_id.to_string(),
            endpoint: endpoint.to_string(),
        })?;
        writer.append(&payload)?;
        let mut state = self.state.write();
        if let Some(space) = state.get_mut(agent_id) {
            space.compressor = Some(endpoint.to_string());
        }
        Ok(())
    }

    /// The compression endpoint registered for `agent_id`, if any.
    pub fn compressor_endpoint(&self, agent_id: &str) -> Result<Option<String>> {
        let state = self.state.read();
        let space = state
            .get(agent_id)
            .ok_or_else(|| StoreError::AgentNotFound(agent_id.to_string()))?;
        Ok(space.compressor.clone())
    }

    /// Atomically replace an agent's entry set with `contents`, used by the
    /// compression pipeline after a successful upstream call.
    pub fn replace_all(&self, agent_id: &str, contents: Vec<String>) -> Result<CompressionOutcome> {
        let mut writer = self.writer.lock();
        let (entries_before, entries) = {
            let state = self.state.read();
            let space = state
                .get(agent_id)
                .ok_or_else(|| StoreError::AgentNotFound(agent_id.to_string()))?;
            let now = Utc::now();
            let entries: Vec<MemoryEntry> = contents
                .into_iter()
                .enumerate()
                .map(|(i, content)| MemoryEntry {
                    content,
                    sequence: space.next_sequence + i as u64,
                    inserted_at: now,
                })
                .collect();
            (space.entries.len() as u64, entries)
        };
        let payload = log::encode(&MemoryRecord::ReplaceAll {
            agent_id: agent_id.to_string(),
            entries: entries.clone(),
        })?;
        writer.append(&payload)?;

        let mut state = self.state.write();
        let entries_after = entries.len() as u64;
        if let Some(space) = state.get_mut(agent_id) {
            let top = entries.iter().map(|e| e.sequence).max().unwrap_or(0);
            space.next_sequence = space.next_sequence.max(top + 1);
            space.entries = entries;
        }
        tracing::info!(agent_id, entries_before, entries_after, "replaced agent memory");
        Ok(CompressionOutcome {
            entries_before,
            entries_after,
        })
    }

    /// Fsync the memory log.
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> MemoryStore {
        MemoryStore::open(&dir.path().join("memory.log")).unwrap()
    }

    #[test]
    fn test_create_meta_and_duplicate() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let meta = store.create_meta("a1", 10).unwrap();
        assert_eq!(meta.agent_id, "a1");
        assert_eq!(meta.total_size, 10);

        assert!(matches!(
            store.create_meta("a1", 5),
            Err(StoreError::AgentExists(_))
        ));
    }

    #[test]
    fn test_set_requires_meta() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        assert!(matches!(
            store.set("ghost", "hello"),
            Err(StoreError::AgentNotFound(_))
        ));
        assert!(matches!(
            store.get("ghost"),
            Err(StoreError::AgentNotFound(_))
        ));
    }

    #[test]
    fn test_entries_in_insertion_order() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.create_meta("a1", 10).unwrap();
        store.set("a1", "first").unwrap();
        store.set("a1", "second").unwrap();
        store.set("a1", "third").unwrap();

        let entries = store.get("a1").unwrap();
        let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert!(entries.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn test_capacity_rejects_consistently() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.create_meta("a1", 3).unwrap();
        store.set("a1", "one").unwrap();
        store.set("a1", "two").unwrap();
        store.set("a1", "three").unwrap();

        for _ in 0..2 {
            assert!(matches!(
                store.set("a1", "overflow"),
                Err(StoreError::CapacityExceeded { limit: 3, .. })
            ));
        }

        let contents: Vec<String> = store
            .get("a1")
            .unwrap()
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_get_page() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.create_meta("a1", 10).unwrap();
        for i in 0..5 {
            store.set("a1", &format!("entry-{i}")).unwrap();
        }

        let page = store.get_page("a1", 1, 2).unwrap();
        let contents: Vec<&str> = page.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["entry-1", "entry-2"]);

        assert!(store.get_page("a1", 10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_register_compressor_requires_meta() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        assert!(matches!(
            store.register_compressor("ghost", "http://localhost:5000/generate"),
            Err(StoreError::AgentNotFound(_))
        ));

        store.create_meta("a1", 3).unwrap();
        store
            .register_compressor("a1", "http://localhost:5000/generate")
            .unwrap();
        assert_eq!(
            store.compressor_endpoint("a1").unwrap().as_deref(),
            Some("http://localhost:5000/generate")
        );
    }

    #[test]
    fn test_replace_all_swaps_entries() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.create_meta("a1", 10).unwrap();
        store.set("a1", "raw one").unwrap();
        store.set("a1", "raw two").unwrap();
        store.set("a1", "raw three").unwrap();

        let outcome = store
            .replace_all("a1", vec!["condensed".to_string()])
            .unwrap();
        assert_eq!(outcome.entries_before, 3);
        assert_eq!(outcome.entries_after, 1);

        let entries = store.get("a1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "condensed");

        // Sequences keep growing past the swap.
        store.set("a1", "after").unwrap();
        let entries = store.get("a1").unwrap();
        assert!(entries[1].sequence > entries[0].sequence);
    }

    #[test]
    fn test_reopen_replays_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.log");

        {
            let store = MemoryStore::open(&path).unwrap();
            store.create_meta("a1", 5).unwrap();
            store.set("a1", "one").unwrap();
            store.set("a1", "two").unwrap();
            store
                .register_compressor("a1", "http://summarizer:5000/generate")
                .unwrap();
            store.create_meta("a2", 2).unwrap();
            store.set("a2", "other").unwrap();
        }

        let reopened = MemoryStore::open(&path).unwrap();
        let contents: Vec<String> = reopened
            .get("a1")
            .unwrap()
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["one", "two"]);
        assert_eq!(reopened.meta("a1").unwrap().total_size, 5);
        assert_eq!(
            reopened.compressor_endpoint("a1").unwrap().as_deref(),
            Some("http://summarizer:5000/generate")
        );
        assert_eq!(reopened.get("a2").unwrap().len(), 1);

        // Capacity still enforced against the replayed count.
        reopened.set("a2", "second").unwrap();
        assert!(matches!(
            reopened.set("a2", "third"),
            Err(StoreError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_replace_all_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory.log");

        {
            let store = MemoryStore::open(&path).unwrap();
            store.create_meta("a1", 10).unwrap();
            store.set("a1", "raw").unwrap();
            store.replace_all("a1", vec!["summary".to_string()]).unwrap();
        }

        let reopened = MemoryStore::open(&path).unwrap();
        let entries = reopened.get("a1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "summary");
    }
}
