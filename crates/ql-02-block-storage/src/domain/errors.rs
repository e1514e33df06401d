//! # Domain Errors

use shared_types::hashing::short_hex;
use shared_types::Hash;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("No committed block at sequence {sequence}")]
    BlockNotFound { sequence: u64 },

    /// Commit would leave a gap or rewrite history.
    #[error("Out-of-order commit: expected sequence {expected}, got {actual}")]
    SequenceMismatch { expected: u64, actual: u64 },

    #[error(
        "Block does not link to head: expected previous {}, got {}",
        short_hex(.expected),
        short_hex(.actual)
    )]
    LinkMismatch { expected: Hash, actual: Hash },

    /// Stored checksum no longer matches the stored bytes.
    #[error(
        "Data corruption in block #{sequence}: \
         checksum {actual_checksum:#010x}, expected {expected_checksum:#010x}"
    )]
    DataCorruption {
        sequence: u64,
        expected_checksum: u32,
        actual_checksum: u32,
    },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Another process holds the data directory.
    #[error("Data directory locked: {message}")]
    DataDirLocked { message: String },
}

impl StorageError {
    /// Backend failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::DatabaseError { .. })
    }
}

/// Failures of the raw key-value layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    Io { message: String },

    #[error("KV store file is corrupt: {message}")]
    Corrupt { message: String },
}

impl From<KVStoreError> for StorageError {
    fn from(err: KVStoreError) -> Self {
        StorageError::DatabaseError {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SerializationError {
    pub message: String,
}

impl From<SerializationError> for StorageError {
    fn from(err: SerializationError) -> Self {
        StorageError::SerializationError {
            message: err.message,
        }
    }
}

impl From<bincode::Error> for SerializationError {
    fn from(err: bincode::Error) -> Self {
        SerializationError {
            message: err.to_string(),
        }
    }
}
