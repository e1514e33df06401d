//! # Integrity Verifier Subsystem (QL-03)
//!
//! Audits committed ranges of the chain and reports the first point where
//! stored data stops matching what was sealed and signed.
//!
//! ## Per-block checks
//!
//! 1. Stored checksum (storage corruption)
//! 2. Sequence number matches position
//! 3. Every record's content hash recomputes
//! 4. Block hash recomputes over header + record hashes
//! 5. `previous_hash` links to the prior block, the checkpoint, or genesis
//! 6. Signature verifies under the recorded signer and algorithm
//!
//! Steps 1-4 and 6 run in parallel chunks on the rayon pool; linkage is
//! checked in order. Cancellation is observed between chunks.
//!
//! ## Checkpoints
//!
//! An incremental audit resumes at `checkpoint + 1`, anchored at the
//! checkpoint hash, after confirming the checkpointed block still hashes to
//! it. Successful passes move the checkpoint forward; cancelled passes save
//! the last contiguously verified block so the next run does not rescan.
//!
//! Divergence is reported (log + `ChainIntegrityViolation` on the bus). It
//! never blocks the writer.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use config::AuditConfig;
pub use domain::cancel::AuditCancel;
pub use domain::report::{
    AuditReport, AuditScope, BlockVerdict, ChainReport, Divergence, DivergenceReason, RangeOutcome,
};
pub use error::VerifierError;
pub use ports::inbound::IntegrityVerifierApi;
pub use service::IntegrityVerifier;
