//! Append-log plumbing shared by the KV store and the memory store.
//!
//! A log file is a sequence of frames:
//!
//! ```text
//! [len: u32 LE][checksum: u32 LE][payload: len bytes]
//! ```
//!
//! where `checksum` is the first four bytes of SHA-256 over the payload and
//! the payload is a bincode-encoded record. Frames are immutable once
//! written; a store's current state is the result of replaying them in
//! order.
//!
//! Replay tolerates a torn tail: a frame whose header runs past the end of
//! the file, whose length is implausible, or whose checksum does not match
//! ends the replay, and the valid prefix length tells the caller where to
//! truncate.

use comdb_models::{Result, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Bytes occupied by the length + checksum header of every frame.
pub const FRAME_HEADER_LEN: u32 = 8;

fn checksum(payload: &[u8]) -> u32 {
    let digest = Sha256::digest(payload);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Encode a record payload with bincode.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decode a record payload with bincode.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    let (value, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map_err(|e| StoreError::Codec(e.to_string()))?;
    Ok(value)
}

/// Append handle for a log file.
///
/// Durability policy: every appended frame is flushed to the OS before
/// `append` returns; `sync` additionally fsyncs. Callers must only publish
/// an index entry for a frame after `append` has returned.
pub struct LogWriter {
    file: BufWriter<File>,
    offset: u64,
}

impl LogWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();
        Ok(Self {
            file: BufWriter::new(file),
            offset,
        })
    }

    /// Current end-of-log offset, i.e. the log size in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Append one frame. Returns its offset and framed length.
    pub fn append(&mut self, payload: &[u8]) -> Result<(u64, u32)> {
        let offset = self.offset;
        let len = payload.len() as u32;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&checksum(payload).to_le_bytes())?;
        self.file.write_all(payload)?;
        self.file.flush()?;
        let framed = FRAME_HEADER_LEN + len;
        self.offset += u64::from(framed);
        Ok((offset, framed))
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }
}

/// Read one frame at a known offset, verifying its checksum.
pub fn read_frame_at(file: &mut File, offset: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut header = [0u8; FRAME_HEADER_LEN as usize];
    file.read_exact(&mut header)?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let mut payload = vec![0u8; len as usize];
    file.read_exact(&mut payload)?;
    if checksum(&payload) != expected {
        return Err(StoreError::Codec(format!(
            "checksum mismatch at offset {offset}"
        )));
    }
    Ok(payload)
}

/// Sequential scan of a log file, stopping at the first torn or corrupt
/// frame.
pub struct LogReplay {
    reader: BufReader<File>,
    offset: u64,
    file_len: u64,
    corrupt: bool,
}

impl LogReplay {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).write(true).read(true).open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
            file_len,
            corrupt: false,
        })
    }

    /// Next valid frame as `(offset, framed_len, payload)`, or `None` at end
    /// of log or at the first frame that fails validation.
    pub fn next_frame(&mut self) -> Option<(u64, u32, Vec<u8>)> {
        if self.corrupt || self.offset >= self.file_len {
            return None;
        }
        if self.offset + u64::from(FRAME_HEADER_LEN) > self.file_len {
            self.corrupt = true;
            return None;
        }
        let mut header = [0u8; FRAME_HEADER_LEN as usize];
        if self.reader.read_exact(&mut header).is_err() {
            self.corrupt = true;
            return None;
        }
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let end = self.offset + u64::from(FRAME_HEADER_LEN) + u64::from(len);
        if end > self.file_len {
            self.corrupt = true;
            return None;
        }
        let mut payload = vec![0u8; len as usize];
        if self.reader.read_exact(&mut payload).is_err() {
            self.corrupt = true;
            return None;
        }
        if checksum(&payload) != expected {
            self.corrupt = true;
            return None;
        }
        let offset = self.offset;
        self.offset = end;
        Some((offset, FRAME_HEADER_LEN + len, payload))
    }

    /// Length of the valid frame prefix. Anything past this is garbage from
    /// a torn write and safe to truncate.
    pub fn valid_len(&self) -> u64 {
        self.offset
    }

    /// Whether the scan ended on a corrupt frame rather than a clean EOF.
    pub fn truncated_tail(&self) -> bool {
        self.corrupt
    }
}

/// Discard everything past `len`, used after replay detects a torn tail.
pub fn truncate_to(path: &Path, len: u64) -> Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut writer = LogWriter::open(&path).unwrap();
        let (off_a, len_a) = writer.append(b"alpha").unwrap();
        let (off_b, _) = writer.append(b"beta").unwrap();
        assert_eq!(off_a, 0);
        assert_eq!(off_b, u64::from(len_a));

        let mut replay = LogReplay::open(&path).unwrap();
        let (o, _, payload) = replay.next_frame().unwrap();
        assert_eq!(o, 0);
        assert_eq!(payload, b"alpha");
        let (_, _, payload) = replay.next_frame().unwrap();
        assert_eq!(payload, b"beta");
        assert!(replay.next_frame().is_none());
        assert!(!replay.truncated_tail());
        assert_eq!(replay.valid_len(), writer.offset());
    }

    #[test]
    fn test_read_frame_at() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut writer = LogWriter::open(&path).unwrap();
        writer.append(b"first").unwrap();
        let (offset, _) = writer.append(b"second").unwrap();

        let mut file = File::open(&path).unwrap();
        let payload = read_frame_at(&mut file, offset).unwrap();
        assert_eq!(payload, b"second");
    }

    #[test]
    fn test_replay_stops_at_torn_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut writer = LogWriter::open(&path).unwrap();
        writer.append(b"kept").unwrap();
        let good_len = writer.offset();
        drop(writer);

        // Simulate a crash mid-append: header promises more bytes than exist.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(&0u32.to_le_bytes()).unwrap();
        file.write_all(b"partial").unwrap();
        drop(file);

        let mut replay = LogReplay::open(&path).unwrap();
        let (_, _, payload) = replay.next_frame().unwrap();
        assert_eq!(payload, b"kept");
        assert!(replay.next_frame().is_none());
        assert!(replay.truncated_tail());
        assert_eq!(replay.valid_len(), good_len);
    }

    #[test]
    fn test_replay_stops_on_checksum_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut writer = LogWriter::open(&path).unwrap();
        writer.append(b"kept").unwrap();
        let good_len = writer.offset();
        drop(writer);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&4u32.to_le_bytes()).unwrap();
        file.write_all(&0xdead_beefu32.to_le_bytes()).unwrap();
        file.write_all(b"junk").unwrap();
        drop(file);

        let mut replay = LogReplay::open(&path).unwrap();
        assert!(replay.next_frame().is_some());
        assert!(replay.next_frame().is_none());
        assert!(replay.truncated_tail());
        assert_eq!(replay.valid_len(), good_len);

        truncate_to(&path, replay.valid_len()).unwrap();
        let mut clean = LogReplay::open(&path).unwrap();
        assert!(clean.next_frame().is_some());
        assert!(clean.next_frame().is_none());
        assert!(!clean.truncated_tail());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Probe {
            id: u64,
            text: String,
        }

        let probe = Probe {
            id: 7,
            text: "hello".into(),
        };
        let bytes = encode(&probe).unwrap();
        let back: Probe = decode(&bytes).unwrap();
        assert_eq!(back, probe);
    }
}
