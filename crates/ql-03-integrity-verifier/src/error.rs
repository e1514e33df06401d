//! Error types for the integrity verifier
//!
//! These are failures to *run* an audit. A chain that fails verification is
//! not an error; it is an `AuditReport::Divergence`.

use ql_01_signature_service::SigningError;
use ql_02_block_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    /// Storage backend unreachable
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Signing service unable to answer
    #[error("Signing service error: {0}")]
    Signing(#[from] SigningError),

    #[error("Invalid range: {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    /// Blocking audit task panicked or was aborted
    #[error("Audit task failed: {0}")]
    TaskFailed(String),
}
