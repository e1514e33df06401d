//! # Block Checks
//!
//! Pure per-block verification. Linkage is left to the caller because it
//! depends on the previous block's outcome.

use crate::domain::report::DivergenceReason;
use ql_01_signature_service::{SigningApi, SigningError};
use shared_types::{hash_eq, Block, Hash};

/// Everything about one block that can be decided without its neighbours.
#[derive(Debug, Clone)]
pub struct BlockCheck {
    pub sequence: u64,
    /// Stored hash; the link anchor for the next block. `None` if unreadable.
    pub block_hash: Option<Hash>,
    pub previous_hash: Option<Hash>,
    pub content: Option<DivergenceReason>,
    pub signature: Option<DivergenceReason>,
}

impl BlockCheck {
    /// A block that could not be loaded at all.
    pub fn unreadable(sequence: u64, reason: DivergenceReason) -> Self {
        Self {
            sequence,
            block_hash: None,
            previous_hash: None,
            content: Some(reason),
            signature: None,
        }
    }

    /// Content failures win over linkage, linkage over signature.
    pub fn verdict(&self, anchor: Option<&Hash>) -> Option<DivergenceReason> {
        self.content
            .clone()
            .or_else(|| link_failure(anchor, self.previous_hash.as_ref()))
            .or_else(|| self.signature.clone())
    }
}

/// Sequence, record hashes and block hash.
pub fn check_content(expected_sequence: u64, block: &Block) -> Option<DivergenceReason> {
    if block.sequence() != expected_sequence {
        return Some(DivergenceReason::SequenceMismatch {
            found: block.sequence(),
        });
    }
    if let Some(index) = block.first_tampered_record() {
        return Some(DivergenceReason::RecordHashMismatch { index });
    }
    if !hash_eq(&block.recompute_hash(), &block.block_hash) {
        return Some(DivergenceReason::BlockHashMismatch);
    }
    None
}

/// Signature under the signer and algorithm recorded in the block.
///
/// Only a transient signer failure is an `Err`; everything else is a verdict.
pub fn check_signature(
    block: &Block,
    signer: &dyn SigningApi,
) -> Result<Option<DivergenceReason>, SigningError> {
    let seal = &block.seal;
    match signer.verify_with(
        &seal.signer_id,
        seal.algorithm,
        &block.signing_message(),
        &seal.signature,
    ) {
        Ok(true) => Ok(None),
        Ok(false) => Ok(Some(DivergenceReason::InvalidSignature)),
        Err(SigningError::IdentityNotFound(id)) => Ok(Some(DivergenceReason::UnknownSigner(id))),
        Err(SigningError::UnknownAlgorithm(alg)) => {
            Ok(Some(DivergenceReason::UnknownAlgorithm(alg)))
        }
        Err(e) if e.is_transient() => Err(e),
        Err(_) => Ok(Some(DivergenceReason::InvalidSignature)),
    }
}

pub fn check_block(
    expected_sequence: u64,
    block: &Block,
    signer: &dyn SigningApi,
) -> Result<BlockCheck, SigningError> {
    Ok(BlockCheck {
        sequence: expected_sequence,
        block_hash: Some(block.block_hash),
        previous_hash: Some(block.previous_hash()),
        content: check_content(expected_sequence, block),
        signature: check_signature(block, signer)?,
    })
}

/// `None` anchor means the prior block was unreadable: nothing to compare.
fn link_failure(anchor: Option<&Hash>, previous: Option<&Hash>) -> Option<DivergenceReason> {
    match (anchor, previous) {
        (Some(anchor), Some(previous)) if !hash_eq(anchor, previous) => {
            Some(DivergenceReason::PreviousHashMismatch)
        }
        _ => None,
    }
}
