//! # Inbound Ports (Driving Ports / API)

use crate::domain::cancel::AuditCancel;
use crate::domain::report::{AuditReport, AuditScope, ChainReport, RangeOutcome};
use crate::error::VerifierError;

/// Integrity verification, as used by the ledger core and operators.
///
/// All methods are blocking and CPU-bound.
pub trait IntegrityVerifierApi: Send + Sync {
    /// Verify `[from, to]` (clipped at the committed head) and stop at the
    /// first divergence.
    fn verify_range(&self, from: u64, to: u64) -> Result<RangeOutcome, VerifierError>;

    /// Verify `[from, to]` and report every index.
    fn verify_chain(&self, from: u64, to: u64) -> Result<ChainReport, VerifierError>;

    /// Run an audit, updating the checkpoint as the scope allows.
    fn audit(&self, scope: AuditScope, cancel: &AuditCancel) -> Result<AuditReport, VerifierError>;
}
