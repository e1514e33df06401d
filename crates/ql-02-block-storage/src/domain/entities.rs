//! # Storage Entities

use serde::{Deserialize, Serialize};
use shared_types::{Block, Hash, Timestamp, GENESIS_HASH};

/// A committed block as persisted, with an integrity checksum.
///
/// The checksum is CRC32 over the serialized `block` and is verified on
/// every read. It catches bit rot and torn writes, not deliberate tampering;
/// that is the integrity verifier's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBlock {
    pub block: Block,
    /// Local storage time, not the seal time.
    pub stored_at: Timestamp,
    pub checksum: u32,
}

impl StoredBlock {
    pub fn new(block: Block, stored_at: Timestamp, checksum: u32) -> Self {
        Self {
            block,
            stored_at,
            checksum,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.block.sequence()
    }
}

/// Committed tip of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    /// Number of committed blocks; also the next sequence to commit.
    pub length: u64,
    /// Hash of block `length - 1`, or `GENESIS_HASH` when empty.
    pub last_hash: Hash,
}

impl ChainHead {
    pub fn genesis() -> Self {
        Self {
            length: 0,
            last_hash: GENESIS_HASH,
        }
    }

    /// Sequence of the newest committed block.
    pub fn last_sequence(&self) -> Option<u64> {
        self.length.checked_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl Default for ChainHead {
    fn default() -> Self {
        Self::genesis()
    }
}

/// Key builders for the persisted layout.
pub struct KeyPrefix;

impl KeyPrefix {
    pub const BLOCK: &'static [u8] = b"b:";
    pub const RECORD: &'static [u8] = b"r:";
    pub const PENDING: &'static [u8] = b"p:";
    pub const HEAD: &'static [u8] = b"m:head";
    pub const CHECKPOINT: &'static [u8] = b"m:checkpoint";
    /// Registered identities, written by the node's identity repository.
    pub const IDENTITY: &'static [u8] = b"i:";

    pub fn block_key(sequence: u64) -> Vec<u8> {
        Self::sequenced(Self::BLOCK, sequence)
    }

    pub fn pending_key(sequence: u64) -> Vec<u8> {
        Self::sequenced(Self::PENDING, sequence)
    }

    pub fn record_key(record_id: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(Self::RECORD.len() + record_id.len());
        key.extend_from_slice(Self::RECORD);
        key.extend_from_slice(record_id.as_bytes());
        key
    }

    pub fn identity_key(identity_id: &str) -> Vec<u8> {
        [Self::IDENTITY, identity_id.as_bytes()].concat()
    }

    /// Big-endian so that lexicographic key order is sequence order.
    fn sequenced(prefix: &[u8], sequence: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(prefix.len() + 8);
        key.extend_from_slice(prefix);
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }

    pub fn sequence_from_key(prefix: &[u8], key: &[u8]) -> Option<u64> {
        let rest = key.strip_prefix(prefix)?;
        let bytes: [u8; 8] = rest.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}
