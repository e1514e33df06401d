//! Domain layer for the ledger core

pub mod backoff;
pub mod buffer;
pub mod commit_queue;
pub mod lifecycle;

use serde::{Deserialize, Serialize};
use shared_types::{Hash, GENESIS_HASH};

/// What readers may see: committed length and whether the ledger closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedHead {
    pub length: u64,
    pub last_hash: Hash,
    pub closed: bool,
}

impl CommittedHead {
    pub fn genesis() -> Self {
        Self {
            length: 0,
            last_hash: GENESIS_HASH,
            closed: false,
        }
    }
}

/// The sealer's view: where the next sealed block goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub next_sequence: u64,
    pub last_sealed_hash: Hash,
}
