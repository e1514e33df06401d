//! # Audit Reports

use serde::{Deserialize, Serialize};
use shared_types::{AlgorithmId, Checkpoint, Hash, IdentityId};
use thiserror::Error;

/// Why a block failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DivergenceReason {
    #[error("block missing from storage")]
    MissingBlock,

    #[error("storage corruption: {0}")]
    StorageCorruption(String),

    #[error("sequence mismatch: stored block claims #{found}")]
    SequenceMismatch { found: u64 },

    #[error("record {index} content hash mismatch")]
    RecordHashMismatch { index: usize },

    #[error("block hash mismatch")]
    BlockHashMismatch,

    #[error("previous hash does not link to prior block")]
    PreviousHashMismatch,

    #[error("unknown signer {0}")]
    UnknownSigner(IdentityId),

    #[error("no verifier loaded for {0}")]
    UnknownAlgorithm(AlgorithmId),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("checkpointed block no longer matches checkpoint hash")]
    CheckpointMismatch,
}

/// First failing position in a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divergence {
    pub sequence: u64,
    pub reason: DivergenceReason,
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block #{}: {}", self.sequence, self.reason)
    }
}

/// Result of `verify_range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Every block in the (head-clipped) range verified. `last` is `None`
    /// when the range held no committed blocks.
    Intact {
        verified: u64,
        last: Option<(u64, Hash)>,
    },
    Diverged(Divergence),
}

impl RangeOutcome {
    pub fn is_intact(&self) -> bool {
        matches!(self, RangeOutcome::Intact { .. })
    }

    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            RangeOutcome::Diverged(d) => Some(d),
            RangeOutcome::Intact { .. } => None,
        }
    }
}

/// Pass/fail for one sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVerdict {
    pub sequence: u64,
    pub failure: Option<DivergenceReason>,
}

impl BlockVerdict {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Per-index report over a range; does not stop at the first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    pub verdicts: Vec<BlockVerdict>,
}

impl ChainReport {
    pub fn all_passed(&self) -> bool {
        self.verdicts.iter().all(BlockVerdict::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BlockVerdict> {
        self.verdicts.iter().filter(|v| !v.passed())
    }

    pub fn first_failure(&self) -> Option<Divergence> {
        self.verdicts.iter().find_map(|v| {
            v.failure.clone().map(|reason| Divergence {
                sequence: v.sequence,
                reason,
            })
        })
    }
}

/// What an audit covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditScope {
    /// From the saved checkpoint to the head.
    Incremental,
    /// The whole chain from genesis.
    Full,
    /// An explicit inclusive range. Never moves the checkpoint.
    Range { from: u64, to: u64 },
}

/// Outcome of `request_audit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditReport {
    /// No divergence from `from` through `through` (`None` when nothing was
    /// committed past `from`). `checkpoint` is set when the pass moved it.
    Verified {
        from: u64,
        through: Option<u64>,
        verified: u64,
        checkpoint: Option<Checkpoint>,
    },
    Divergence(Divergence),
    /// Stopped early; the next incremental audit starts at `resume_from`.
    Cancelled { resume_from: u64 },
}

impl AuditReport {
    pub fn is_verified(&self) -> bool {
        matches!(self, AuditReport::Verified { .. })
    }
}
