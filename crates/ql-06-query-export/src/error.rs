//! Error types for queries

use ql_02_block_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// No committed record with this id
    #[error("Record not found: {id}")]
    RecordNotFound { id: String },

    /// Sequence at or beyond the committed head
    #[error("Block not found: {sequence}")]
    BlockNotFound { sequence: u64 },

    #[error("Invalid range: {from} > {to}")]
    InvalidRange { from: u64, to: u64 },

    /// Index points at a block that does not hold the record
    #[error("Record index inconsistent for {id} at block {sequence}")]
    IndexInconsistent { id: String, sequence: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl QueryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::Storage(e) if e.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
