//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Events**: `Record`, `EventType`
//! - **Identity**: `Identity`, `IdentityId`, `AlgorithmId`, `IdentityStatus`
//! - **Chain**: `BlockHeader`, `SealedBlock`, `Block`, `BlockSeal`, `BlockState`
//! - **Audit**: `Checkpoint`

use crate::errors::DomainError;
use crate::hashing::{hash_eq, Hash, LedgerHasher};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;
use std::str::FromStr;

/// Record identifier. This is the idempotency key supplied by the producer.
pub type RecordId = String;

const RECORD_DOMAIN: &[u8] = b"QL-RECORD-V1";
const BLOCK_DOMAIN: &[u8] = b"QL-BLOCK-V1";
const SIGNATURE_DOMAIN: &[u8] = b"QL-SIG-V1";

// =============================================================================
// CLUSTER A: EVENTS
// =============================================================================

/// Kind of debtor/case event admitted to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CaseClosure,
    InteractionLogged,
    SlaBreach,
    Other,
}

impl EventType {
    /// Stable byte used inside the record hash. Never renumber.
    pub fn tag(&self) -> u8 {
        match self {
            EventType::CaseClosure => 1,
            EventType::InteractionLogged => 2,
            EventType::SlaBreach => 3,
            EventType::Other => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CaseClosure => "case_closure",
            EventType::InteractionLogged => "interaction_logged",
            EventType::SlaBreach => "sla_breach",
            EventType::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "case_closure" => Ok(EventType::CaseClosure),
            "interaction_logged" => Ok(EventType::InteractionLogged),
            "sla_breach" => Ok(EventType::SlaBreach),
            "other" => Ok(EventType::Other),
            unknown => Err(DomainError::UnknownEventType(unknown.to_string())),
        }
    }
}

/// One immutable event admitted to the ledger.
///
/// Fields are private; the only way to obtain a `Record` is [`Record::new`],
/// which fixes `content_hash` over every other field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    timestamp: Timestamp,
    actor_id: String,
    case_id: String,
    event_type: EventType,
    payload: Vec<u8>,
    content_hash: Hash,
}

impl Record {
    pub fn new(
        id: impl Into<RecordId>,
        timestamp: Timestamp,
        actor_id: impl Into<String>,
        case_id: impl Into<String>,
        event_type: EventType,
        payload: Vec<u8>,
    ) -> Self {
        let mut record = Self {
            id: id.into(),
            timestamp,
            actor_id: actor_id.into(),
            case_id: case_id.into(),
            event_type,
            payload,
            content_hash: [0u8; 32],
        };
        record.content_hash = record.recompute_hash();
        record
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Hash fixed at acceptance time.
    pub fn content_hash(&self) -> Hash {
        self.content_hash
    }

    /// Hash of the record's current field values.
    pub fn recompute_hash(&self) -> Hash {
        let mut hasher = LedgerHasher::new(RECORD_DOMAIN);
        hasher
            .field(self.id.as_bytes())
            .u64(self.timestamp)
            .field(self.actor_id.as_bytes())
            .field(self.case_id.as_bytes())
            .tag(self.event_type.tag())
            .field(&self.payload);
        hasher.finalize()
    }

    /// `true` when the stored hash still matches the fields.
    pub fn is_intact(&self) -> bool {
        hash_eq(&self.content_hash, &self.recompute_hash())
    }
}

// =============================================================================
// CLUSTER B: IDENTITY
// =============================================================================

/// Opaque identity identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityId(pub String);

impl IdentityId {
    /// Deterministic id for a public key under an algorithm.
    pub fn derive(algorithm: AlgorithmId, public_key: &[u8]) -> Self {
        let mut hasher = LedgerHasher::new(b"QL-IDENTITY-V1");
        hasher.tag(algorithm.tag()).field(public_key);
        let digest = hasher.finalize();
        IdentityId(format!("id-{}", hex::encode(&digest[..16])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        IdentityId(value.to_string())
    }
}

/// Signature scheme identifier stored per Identity and per Block.
///
/// `Ed25519` is classical and only retained so that identities provisioned
/// before the post-quantum migration stay verifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlgorithmId {
    Dilithium2,
    Dilithium3,
    Ed25519,
}

impl AlgorithmId {
    /// Stable tag byte. Never renumber.
    pub fn tag(&self) -> u8 {
        match self {
            AlgorithmId::Dilithium2 => 0x12,
            AlgorithmId::Dilithium3 => 0x13,
            AlgorithmId::Ed25519 => 0xED,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmId::Dilithium2 => "dilithium2",
            AlgorithmId::Dilithium3 => "dilithium3",
            AlgorithmId::Ed25519 => "ed25519",
        }
    }

    pub fn is_post_quantum(&self) -> bool {
        !matches!(self, AlgorithmId::Ed25519)
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dilithium2" | "ml-dsa-44" => Ok(AlgorithmId::Dilithium2),
            "dilithium3" | "ml-dsa-65" => Ok(AlgorithmId::Dilithium3),
            "ed25519" => Ok(AlgorithmId::Ed25519),
            _ => Err(DomainError::UnknownAlgorithm(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityStatus {
    Active,
    Revoked,
}

/// A registered signer: public key plus the scheme it belongs to.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    #[serde_as(as = "Bytes")]
    pub public_key: Vec<u8>,
    pub algorithm: AlgorithmId,
    pub status: IdentityStatus,
    /// Revocation takes effect at this instant (inclusive).
    pub revoked_at: Option<Timestamp>,
}

impl Identity {
    pub fn new(public_key: Vec<u8>, algorithm: AlgorithmId) -> Self {
        Self {
            id: IdentityId::derive(algorithm, &public_key),
            public_key,
            algorithm,
            status: IdentityStatus::Active,
            revoked_at: None,
        }
    }

    /// Revocation is forward-only: it is checked against signing time only.
    pub fn is_revoked_at(&self, now: Timestamp) -> bool {
        matches!(self.revoked_at, Some(at) if now >= at)
    }
}

// =============================================================================
// CLUSTER C: THE CHAIN
// =============================================================================

/// Fields fixed at sealing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Position in the chain, gapless from 0.
    pub sequence: u64,
    /// Hash of the block at `sequence - 1`, or `GENESIS_HASH`.
    pub previous_hash: Hash,
    /// Seal time in unix millis.
    pub sealed_at: Timestamp,
}

/// `SHA3-256` over header fields and the ordered record hashes.
pub fn compute_block_hash(header: &BlockHeader, record_hashes: &[Hash]) -> Hash {
    let mut hasher = LedgerHasher::new(BLOCK_DOMAIN);
    hasher
        .u64(header.sequence)
        .digest(&header.previous_hash)
        .u32(record_hashes.len() as u32);
    for hash in record_hashes {
        hasher.digest(hash);
    }
    hasher.u64(header.sealed_at);
    hasher.finalize()
}

/// The exact bytes a signer signs for a block.
pub fn signing_message(sequence: u64, block_hash: &Hash) -> Vec<u8> {
    let mut message = Vec::with_capacity(SIGNATURE_DOMAIN.len() + 8 + 32);
    message.extend_from_slice(SIGNATURE_DOMAIN);
    message.extend_from_slice(&sequence.to_be_bytes());
    message.extend_from_slice(block_hash);
    message
}

/// A block whose content is frozen but which has not been signed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlock {
    pub header: BlockHeader,
    pub records: Vec<Record>,
    pub block_hash: Hash,
}

impl SealedBlock {
    pub fn seal(header: BlockHeader, records: Vec<Record>) -> Self {
        let hashes: Vec<Hash> = records.iter().map(Record::content_hash).collect();
        let block_hash = compute_block_hash(&header, &hashes);
        Self {
            header,
            records,
            block_hash,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.header.sequence
    }

    pub fn signing_message(&self) -> Vec<u8> {
        signing_message(self.header.sequence, &self.block_hash)
    }

    pub fn into_signed(self, seal: BlockSeal) -> Block {
        Block {
            header: self.header,
            records: self.records,
            block_hash: self.block_hash,
            seal,
        }
    }
}

/// Who signed a block, under which scheme, and the signature itself.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSeal {
    pub signer_id: IdentityId,
    pub algorithm: AlgorithmId,
    #[serde_as(as = "Bytes")]
    pub signature: Vec<u8>,
}

/// A committed, signed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub records: Vec<Record>,
    pub block_hash: Hash,
    pub seal: BlockSeal,
}

impl Block {
    pub fn sequence(&self) -> u64 {
        self.header.sequence
    }

    pub fn previous_hash(&self) -> Hash {
        self.header.previous_hash
    }

    pub fn signing_message(&self) -> Vec<u8> {
        signing_message(self.header.sequence, &self.block_hash)
    }

    /// Block hash recomputed from the stored record hashes.
    pub fn recompute_hash(&self) -> Hash {
        let hashes: Vec<Hash> = self.records.iter().map(Record::content_hash).collect();
        compute_block_hash(&self.header, &hashes)
    }

    /// Position of the first record whose fields no longer match its hash.
    pub fn first_tampered_record(&self) -> Option<usize> {
        self.records.iter().position(|r| !r.is_intact())
    }
}

/// Lifecycle of a block inside the ledger core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    Buffering,
    Sealing,
    Signing,
    /// Retry budget exhausted; waiting for re-drive. Not terminal.
    FailedPending,
    Committed,
}

impl BlockState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BlockState::Committed)
    }

    /// Allowed lifecycle edges. Nothing ever returns to `Buffering`.
    pub fn can_transition_to(&self, next: BlockState) -> bool {
        use BlockState::*;
        matches!(
            (self, next),
            (Buffering, Sealing)
                | (Sealing, Signing)
                | (Signing, Committed)
                | (Signing, FailedPending)
                | (FailedPending, Signing)
        )
    }
}

// =============================================================================
// CLUSTER D: AUDIT
// =============================================================================

/// Last fully verified position in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub sequence: u64,
    pub block_hash: Hash,
    pub recorded_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::GENESIS_HASH;

    fn record(id: &str, payload: &[u8]) -> Record {
        Record::new(
            id,
            1_700_000_000_000,
            "agent-7",
            "case-42",
            EventType::CaseClosure,
            payload.to_vec(),
        )
    }

    #[test]
    fn test_record_hash_covers_every_field() {
        const T: u64 = 1_700_000_000_000;
        let base = record("e1", b"closed");
        let variants = [
            record("e2", b"closed"),
            record("e1", b"closed!"),
            Record::new("e1", 1, "agent-7", "case-42", EventType::CaseClosure, b"closed".to_vec()),
            Record::new("e1", T, "agent-8", "case-42", EventType::CaseClosure, b"closed".to_vec()),
            Record::new("e1", T, "agent-7", "case-43", EventType::CaseClosure, b"closed".to_vec()),
            Record::new("e1", T, "agent-7", "case-42", EventType::SlaBreach, b"closed".to_vec()),
        ];
        for other in variants {
            assert_ne!(base.content_hash(), other.content_hash());
        }
        assert!(base.is_intact());
    }

    #[test]
    fn test_tampered_record_detected_after_deserialize() {
        let block = SealedBlock::seal(
            BlockHeader { sequence: 0, previous_hash: GENESIS_HASH, sealed_at: 5 },
            vec![record("e1", b"a"), record("e2", b"b")],
        )
        .into_signed(BlockSeal {
            signer_id: IdentityId::from("id-x"),
            algorithm: AlgorithmId::Dilithium2,
            signature: vec![1, 2, 3],
        });

        let mut json = serde_json::to_value(&block).unwrap();
        json["records"][1]["payload"][0] = serde_json::json!(b'z');
        let tampered: Block = serde_json::from_value(json).unwrap();

        assert_eq!(tampered.first_tampered_record(), Some(1));
        // Stored hashes are untouched, so only the record check catches it.
        assert_eq!(tampered.recompute_hash(), block.block_hash);
    }

    #[test]
    fn test_block_hash_depends_on_order_and_link() {
        let header = BlockHeader { sequence: 3, previous_hash: [1; 32], sealed_at: 9 };
        let a = record("a", b"1").content_hash();
        let b = record("b", b"2").content_hash();

        let h1 = compute_block_hash(&header, &[a, b]);
        assert_ne!(h1, compute_block_hash(&header, &[b, a]));
        let relinked = BlockHeader {
            previous_hash: [2; 32],
            ..header
        };
        assert_ne!(h1, compute_block_hash(&relinked, &[a, b]));
        assert_ne!(h1, compute_block_hash(&BlockHeader { sealed_at: 10, ..header }, &[a, b]));
    }

    #[test]
    fn test_signing_message_binds_sequence() {
        assert_ne!(signing_message(1, &[0; 32]), signing_message(2, &[0; 32]));
    }

    #[test]
    fn test_identity_revocation_is_inclusive() {
        let mut identity = Identity::new(vec![9; 32], AlgorithmId::Dilithium3);
        assert!(!identity.is_revoked_at(u64::MAX));
        identity.revoked_at = Some(100);
        assert!(!identity.is_revoked_at(99));
        assert!(identity.is_revoked_at(100));
    }

    #[test]
    fn test_identity_id_is_deterministic_per_algorithm() {
        let a = IdentityId::derive(AlgorithmId::Dilithium2, b"pk");
        assert_eq!(a, IdentityId::derive(AlgorithmId::Dilithium2, b"pk"));
        assert_ne!(a, IdentityId::derive(AlgorithmId::Dilithium3, b"pk"));
        assert!(a.as_str().starts_with("id-"));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!("sla_breach".parse::<EventType>().unwrap(), EventType::SlaBreach);
        assert!("refund".parse::<EventType>().is_err());
        assert_eq!("ML-DSA-44".parse::<AlgorithmId>().unwrap(), AlgorithmId::Dilithium2);
        assert_eq!(
            serde_json::to_string(&EventType::InteractionLogged).unwrap(),
            "\"interaction_logged\""
        );
    }

    #[test]
    fn test_block_bincode_roundtrip_preserves_hash() {
        let sealed = SealedBlock::seal(
            BlockHeader { sequence: 1, previous_hash: [4; 32], sealed_at: 77 },
            vec![record("x", b"payload")],
        );
        let bytes = bincode::serialize(&sealed).unwrap();
        let back: SealedBlock = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.block_hash, sealed.block_hash);
    }

    #[test]
    fn test_block_state_never_returns_to_buffering() {
        use BlockState::*;
        assert!(Signing.can_transition_to(FailedPending));
        assert!(FailedPending.can_transition_to(Signing));
        assert!(!FailedPending.can_transition_to(Committed));
        assert!(!Committed.can_transition_to(Signing));
        for state in [Sealing, Signing, FailedPending, Committed] {
            assert!(!state.can_transition_to(Buffering));
        }
    }
}
