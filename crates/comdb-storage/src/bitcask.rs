//! Log-structured key-value store.
//!
//! One append-only log file plus an in-memory ordered index mapping each key
//! to its latest record. Writes append a [`Record`] frame and then publish
//! the new location in the index; reads resolve the index and fetch the
//! record bytes at that offset. A tombstone record masks a key; compaction
//! rewrites the log keeping only the latest live record per key.
//!
//! On startup the log is replayed from offset 0 to rebuild the index. A torn
//! trailing frame (crash mid-append) is detected by the frame checksum,
//! logged, and truncated away; startup then proceeds normally.
//!
//! Lock order is `writer -> index -> reader`. `get` holds the index read
//! lock across its file read, so `compact` (which takes all three locks)
//! can never move a record out from under an in-flight read.

use crate::log::{self, LogReplay, LogWriter};
use comdb_models::{Record, RecordPointer, Result, StoreError, StoreStats};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

struct WriterState {
    log: LogWriter,
    next_sequence: u64,
}

#[derive(Default)]
struct KeyDir {
    map: BTreeMap<String, RecordPointer>,
    tombstone_records: u64,
    reclaimable_bytes: u64,
}

/// The KV engine. Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Bitcask {
    path: PathBuf,
    writer: Mutex<WriterState>,
    index: RwLock<KeyDir>,
    reader: Mutex<File>,
}

impl Bitcask {
    /// Open the store at `path`, replaying the log to rebuild the index.
    pub fn open(path: &Path) -> Result<Self> {
        let mut dir = KeyDir::default();
        let mut next_sequence = 1u64;

        let mut replay = LogReplay::open(path)?;
        while let Some((offset, len, payload)) = replay.next_frame() {
            let record: Record = log::decode(&payload)?;
            next_sequence = next_sequence.max(record.sequence + 1);
            if record.tombstone {
                if let Some(old) = dir.map.remove(&record.key) {
                    dir.reclaimable_bytes += u64::from(old.len);
                }
                dir.tombstone_records += 1;
                dir.reclaimable_bytes += u64::from(len);
            } else {
                let ptr = RecordPointer {
                    offset,
                    len,
                    sequence: record.sequence,
                };
                if let Some(old) = dir.map.insert(record.key, ptr) {
                    dir.reclaimable_bytes += u64::from(old.len);
                }
            }
        }
        if replay.truncated_tail() {
            tracing::warn!(
                path = %path.display(),
                valid_len = replay.valid_len(),
                "discarding torn tail of kv log"
            );
            log::truncate_to(path, replay.valid_len())?;
        }
        drop(replay);

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WriterState {
                log: LogWriter::open(path)?,
                next_sequence,
            }),
            index: RwLock::new(dir),
            reader: Mutex::new(File::open(path)?),
        })
    }

    /// Store `value` under `key`, superseding any earlier record.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut writer = self.writer.lock();
        let sequence = writer.next_sequence;
        let payload = log::encode(&Record::put(sequence, key, value))?;
        let (offset, len) = writer.log.append(&payload)?;
        writer.next_sequence += 1;

        // The writer lock is held across the index update, so a later
        // sequence can never be shadowed by an earlier one.
        let mut index = self.index.write();
        let ptr = RecordPointer {
            offset,
            len,
            sequence,
        };
        if let Some(old) = index.map.insert(key.to_string(), ptr) {
            index.reclaimable_bytes += u64::from(old.len);
        }
        Ok(())
    }

    /// Latest value for `key`, or `KeyNotFound` if absent or tombstoned.
    pub fn get(&self, key: &str) -> Result<String> {
        let index = self.index.read();
        let ptr = index
            .map
            .get(key)
            .copied()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        let record = self.read_record(ptr)?;
        Ok(record.value)
    }

    /// Append a tombstone for `key`. Deleting a key with no live record is
    /// an idempotent no-op; the return value reports whether a live key was
    /// actually removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut writer = self.writer.lock();
        if !self.index.read().map.contains_key(key) {
            return Ok(false);
        }
        let sequence = writer.next_sequence;
        let payload = log::encode(&Record::tombstone(sequence, key))?;
        let (_, len) = writer.log.append(&payload)?;
        writer.next_sequence += 1;

        let mut index = self.index.write();
        if let Some(old) = index.map.remove(key) {
            index.reclaimable_bytes += u64::from(old.len);
        }
        index.tombstone_records += 1;
        index.reclaimable_bytes += u64::from(len);
        Ok(true)
    }

    /// All live keys in sorted order. The order is stable across calls with
    /// no intervening writes.
    pub fn list_keys(&self) -> Vec<String> {
        self.index.read().map.keys().cloned().collect()
    }

    /// All live `(key, value)` pairs whose key starts with `prefix`, via a
    /// range scan over the ordered index. An empty prefix matches all keys.
    pub fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let index = self.index.read();
        let mut pairs = Vec::new();
        for (key, ptr) in index.map.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let record = self.read_record(*ptr)?;
            pairs.push((key.clone(), record.value));
        }
        Ok(pairs)
    }

    pub fn stats(&self) -> StoreStats {
        let writer = self.writer.lock();
        let index = self.index.read();
        StoreStats {
            live_keys: index.map.len() as u64,
            log_size_bytes: writer.log.offset(),
            tombstone_records: index.tombstone_records,
            reclaimable_bytes: index.reclaimable_bytes,
        }
    }

    /// Fsync the log.
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().log.sync()
    }

    /// Rewrite the log keeping only the latest live record per key, then
    /// atomically swap it in. Sequence numbers are preserved, so replaying
    /// the compacted log reconstructs the same index.
    pub fn compact(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let mut index = self.index.write();
        let mut reader = self.reader.lock();

        let tmp_path = self.path.with_extension("compact");
        match fs::remove_file(&tmp_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut new_log = LogWriter::open(&tmp_path)?;
        let mut new_map = BTreeMap::new();
        for (key, ptr) in &index.map {
            let payload = log::read_frame_at(&mut reader, ptr.offset)?;
            let (offset, len) = new_log.append(&payload)?;
            new_map.insert(
                key.clone(),
                RecordPointer {
                    offset,
                    len,
                    sequence: ptr.sequence,
                },
            );
        }
        new_log.sync()?;
        drop(new_log);

        let old_size = writer.log.offset();
        fs::rename(&tmp_path, &self.path)?;
        writer.log = LogWriter::open(&self.path)?;
        *reader = File::open(&self.path)?;
        index.map = new_map;
        index.tombstone_records = 0;
        index.reclaimable_bytes = 0;

        tracing::info!(
            path = %self.path.display(),
            live_keys = index.map.len(),
            old_size,
            new_size = writer.log.offset(),
            "compacted kv log"
        );
        Ok(())
    }

    fn read_record(&self, ptr: RecordPointer) -> Result<Record> {
        let mut reader = self.reader.lock();
        let payload = log::read_frame_at(&mut reader, ptr.offset)?;
        log::decode(&payload)
    }
}
