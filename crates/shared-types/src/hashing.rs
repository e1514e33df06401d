//! # Canonical Hashing
//!
//! SHA3-256 with length-prefixed framing. Every variable-length field is
//! written as `len:u32 BE || bytes` so that no two distinct field layouts can
//! produce the same preimage.

use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;

/// A 32-byte SHA3-256 digest.
pub type Hash = [u8; 32];

/// `SHA3-256("QUANTUM-LEDGER-GENESIS-V1")`, the `previous_hash` of sequence 0.
pub const GENESIS_HASH: Hash = [
    0xed, 0xd5, 0x53, 0xc9, 0xbb, 0x62, 0x7e, 0x8b, 0xa0, 0x26, 0x7b, 0xad, 0x5e, 0xce, 0xb5, 0x9b,
    0x77, 0x13, 0x43, 0x0e, 0xdd, 0x34, 0xa0, 0xab, 0x16, 0x53, 0x5f, 0x09, 0xf7, 0xbc, 0x94, 0xbe,
];

/// Incremental hasher that enforces the ledger's framing rules.
pub struct LedgerHasher {
    inner: Sha3_256,
}

impl LedgerHasher {
    /// Start a hasher for the given domain tag.
    pub fn new(domain: &[u8]) -> Self {
        let mut inner = Sha3_256::new();
        inner.update(domain);
        Self { inner }
    }

    /// Append a length-prefixed byte field.
    pub fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update((bytes.len() as u32).to_be_bytes());
        self.inner.update(bytes);
        self
    }

    /// Append a fixed-width big-endian integer.
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.inner.update(value.to_be_bytes());
        self
    }

    /// Append a fixed-width big-endian integer.
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.inner.update(value.to_be_bytes());
        self
    }

    /// Append a single tag byte.
    pub fn tag(&mut self, tag: u8) -> &mut Self {
        self.inner.update([tag]);
        self
    }

    /// Append a digest (fixed width, no prefix).
    pub fn digest(&mut self, hash: &Hash) -> &mut Self {
        self.inner.update(hash);
        self
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }
}

/// One-shot SHA3-256.
pub fn sha3_256(data: &[u8]) -> Hash {
    Sha3_256::digest(data).into()
}

/// Constant-time digest comparison.
pub fn hash_eq(a: &Hash, b: &Hash) -> bool {
    a.ct_eq(b).into()
}

/// Short hex prefix for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}
