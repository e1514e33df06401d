//! Error types for the ledger core

use ql_02_block_storage::StorageError;
use ql_03_integrity_verifier::VerifierError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The open buffer is full; retry later
    #[error("Capacity exceeded: {buffered} buffered + {requested} requested > {limit}")]
    CapacityExceeded {
        requested: usize,
        buffered: usize,
        limit: usize,
    },

    /// A sealed block exhausted its signing retries and is parked
    #[error("Signing unavailable for block #{sequence}: {reason}")]
    SigningUnavailable { sequence: u64, reason: String },

    /// Not a committed block
    #[error("Block #{sequence} not found")]
    NotFound { sequence: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),

    /// Persisted pending slots do not continue the committed chain
    #[error("Recovery failed: {0}")]
    Recovery(String),

    #[error("Ledger is closed")]
    Closed,

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl LedgerError {
    /// Whether a caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::CapacityExceeded { .. } | LedgerError::SigningUnavailable { .. } => true,
            LedgerError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
