//! Error types for the ingest gateway
//!
//! Validation failures are not errors; they come back as
//! `SubmitOutcome::Rejected`. These are the cases where the caller should
//! retry later or escalate.

use ql_02_block_storage::StorageError;
use ql_04_ledger_core::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Ledger buffer full; back off and resubmit
    #[error("Capacity exceeded: {buffered} of {limit} buffered")]
    CapacityExceeded { buffered: usize, limit: usize },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Dedup index rebuild failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IngestError {
    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::CapacityExceeded { .. } => true,
            IngestError::Ledger(e) => e.is_transient(),
            IngestError::Storage(e) => e.is_transient(),
        }
    }
}
