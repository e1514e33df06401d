//! File-backed key-value store.
//!
//! An append-only log. Each `put`, `delete` or batch appends one framed entry
//! and is `fsync`ed before it becomes visible in memory, so a write costs
//! the size of the change, not the size of the chain. The log is replayed
//! on open. When dead entries outweigh live data the log is compacted into
//! a fresh snapshot via temp file + rename.
//!
//! ## File Format
//!
//! ```text
//! "QLOG" | ([payload_len:u32 le][crc32(payload):u32 le][payload])*
//! payload = bincode(Vec<LogOp>)
//! ```
//!
//! A frame that runs past the end of the file, or a bad final frame, is a
//! write torn by a crash and is cut off on open. A bad frame followed by
//! more data is corruption.

use crate::adapters::lock::DataDirLock;
use crate::domain::errors::{KVStoreError, StorageError};
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const MAGIC: &[u8; 4] = b"QLOG";
const LOG_FILE: &str = "ledger.log";
const FRAME_HEADER: usize = 8;

/// Logs smaller than this are never compacted.
const COMPACT_MIN_BYTES: u64 = 4 * 1024 * 1024;

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Serialize, Deserialize)]
enum LogOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

impl From<BatchOperation> for LogOp {
    fn from(op: BatchOperation) -> Self {
        match op {
            BatchOperation::Put { key, value } => LogOp::Put(key, value),
            BatchOperation::Delete { key } => LogOp::Delete(key),
        }
    }
}

struct LogState {
    data: Map,
    log: File,
    /// Bytes in the log file, header included.
    log_len: u64,
    /// Bytes a snapshot of `data` would take.
    live_bytes: u64,
}

impl LogState {
    fn apply(&mut self, ops: Vec<LogOp>) {
        for op in ops {
            match op {
                LogOp::Put(key, value) => {
                    let added = entry_cost(&key, &value);
                    if let Some(old) = self.data.insert(key.clone(), value) {
                        self.live_bytes -= entry_cost(&key, &old);
                    }
                    self.live_bytes += added;
                }
                LogOp::Delete(key) => {
                    if let Some(old) = self.data.remove(&key) {
                        self.live_bytes -= entry_cost(&key, &old);
                    }
                }
            }
        }
    }

    fn needs_compaction(&self) -> bool {
        self.log_len > COMPACT_MIN_BYTES && self.log_len > 2 * self.live_bytes
    }
}

fn entry_cost(key: &[u8], value: &[u8]) -> u64 {
    (key.len() + value.len() + 16) as u64
}

pub struct FileBackedKVStore {
    state: RwLock<LogState>,
    path: PathBuf,
    _lock: DataDirLock,
}

impl FileBackedKVStore {
    /// Open (or create) the store in `data_dir`, holding its process lock
    /// until the store is dropped.
    pub fn open(data_dir: impl AsRef<Path>, lock_timeout: Duration) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(|e| StorageError::DatabaseError {
            message: format!("cannot create {}: {}", data_dir.display(), e),
        })?;

        let lock = DataDirLock::acquire(data_dir, lock_timeout).map_err(|e| {
            StorageError::DataDirLocked {
                message: e.to_string(),
            }
        })?;

        let path = data_dir.join(LOG_FILE);
        let state = replay(&path)?;
        info!(
            path = %path.display(),
            keys = state.data.len(),
            log_bytes = state.log_len,
            "[ql-02] Storage log opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            path,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log file in bytes.
    pub fn log_len(&self) -> u64 {
        self.state.read().log_len
    }

    /// Rewrite the log as a single snapshot frame.
    pub fn compact(&self) -> Result<(), KVStoreError> {
        let mut state = self.state.write();
        self.compact_locked(&mut state)
    }

    fn compact_locked(&self, state: &mut LogState) -> Result<(), KVStoreError> {
        let before = state.log_len;
        let snapshot: Vec<LogOp> = state
            .data
            .iter()
            .map(|(k, v)| LogOp::Put(k.clone(), v.clone()))
            .collect();

        let mut bytes = MAGIC.to_vec();
        if !snapshot.is_empty() {
            bytes.extend_from_slice(&encode_frame(&snapshot)?);
        }

        let temp_path = self.path.with_extension("compact");
        let mut file = File::create(&temp_path).map_err(io)?;
        file.write_all(&bytes).map_err(io)?;
        file.sync_all().map_err(io)?;
        std::fs::rename(&temp_path, &self.path).map_err(io)?;
        if let Some(dir) = self.path.parent() {
            File::open(dir).and_then(|d| d.sync_all()).map_err(io)?;
        }

        state.log = open_append(&self.path)?;
        state.log_len = bytes.len() as u64;
        info!(before, after = state.log_len, "[ql-02] Storage log compacted");
        Ok(())
    }

    /// Append `ops` as one frame, sync, then apply them in memory.
    /// Memory never runs ahead of disk.
    fn append(&self, ops: Vec<LogOp>) -> Result<(), KVStoreError> {
        let frame = encode_frame(&ops)?;
        let mut state = self.state.write();

        let written = state
            .log
            .write_all(&frame)
            .and_then(|()| state.log.sync_data());
        if let Err(e) = written {
            // Cut off whatever part of the frame made it out.
            if let Err(trunc) = state.log.set_len(state.log_len) {
                warn!(error = %trunc, "[ql-02] Could not cut off a failed log append");
            }
            return Err(io(e));
        }

        state.log_len += frame.len() as u64;
        state.apply(ops);
        debug!(bytes = frame.len(), log_bytes = state.log_len, "[ql-02] Log entry appended");

        if state.needs_compaction() {
            if let Err(e) = self.compact_locked(&mut state) {
                warn!(error = %e, "[ql-02] Log compaction failed; continuing on the old log");
            }
        }
        Ok(())
    }
}

fn io(e: std::io::Error) -> KVStoreError {
    KVStoreError::Io {
        message: e.to_string(),
    }
}

fn open_append(path: &Path) -> Result<File, KVStoreError> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(io)
}

fn encode_frame(ops: &[LogOp]) -> Result<Vec<u8>, KVStoreError> {
    let payload = bincode::serialize(ops).map_err(|e| KVStoreError::Corrupt {
        message: format!("cannot encode log entry: {}", e),
    })?;
    let len = u32::try_from(payload.len()).map_err(|_| KVStoreError::Corrupt {
        message: format!("log entry of {} bytes is too large", payload.len()),
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Result of scanning the log bytes.
#[derive(Debug)]
struct Scan {
    frames: Vec<Vec<LogOp>>,
    /// Length of the valid prefix.
    valid_len: usize,
}

fn scan(bytes: &[u8]) -> Result<Scan, KVStoreError> {
    let corrupt = |message: String| KVStoreError::Corrupt { message };

    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(corrupt("missing log header".into()));
    }

    let mut frames = Vec::new();
    let mut offset = MAGIC.len();
    while offset < bytes.len() {
        let Some(header) = bytes.get(offset..offset + FRAME_HEADER) else {
            break;
        };
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let start = offset + FRAME_HEADER;
        let Some(payload) = bytes.get(start..start + len) else {
            break;
        };
        let end = start + len;

        let decoded = if crc32fast::hash(payload) == crc {
            bincode::deserialize::<Vec<LogOp>>(payload).ok()
        } else {
            None
        };
        match decoded {
            Some(ops) => frames.push(ops),
            None if end == bytes.len() => break,
            None => {
                return Err(corrupt(format!("log entry at byte {} is damaged", offset)));
            }
        }
        offset = end;
    }

    Ok(Scan {
        frames,
        valid_len: offset,
    })
}

fn replay(path: &Path) -> Result<LogState, KVStoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(io(e)),
    };

    let log = open_append(path)?;
    if bytes.is_empty() {
        (&log).write_all(MAGIC).map_err(io)?;
        log.sync_all().map_err(io)?;
        return Ok(LogState {
            data: Map::new(),
            log,
            log_len: MAGIC.len() as u64,
            live_bytes: 0,
        });
    }

    let Scan { frames, valid_len } = scan(&bytes)?;
    if valid_len < bytes.len() {
        warn!(
            path = %path.display(),
            dropped = bytes.len() - valid_len,
            "[ql-02] Cutting off a torn write at the end of the log"
        );
        log.set_len(valid_len as u64).map_err(io)?;
        log.sync_all().map_err(io)?;
    }

    let mut state = LogState {
        data: Map::new(),
        log,
        log_len: valid_len as u64,
        live_bytes: 0,
    };
    for ops in frames {
        state.apply(ops);
    }
    Ok(state)
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.state.read().data.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.append(vec![LogOp::Put(key.to_vec(), value.to_vec())])
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.append(vec![LogOp::Delete(key.to_vec())])
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.append(operations.into_iter().map(LogOp::from).collect())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.state.read().data.contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .state
            .read()
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
