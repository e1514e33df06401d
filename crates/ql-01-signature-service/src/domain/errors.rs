//! # Signing Errors

use shared_types::{AlgorithmId, IdentityId, Timestamp};
use thiserror::Error;

/// Errors that can occur while signing or verifying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SigningError {
    /// No identity is registered under this id.
    #[error("Identity not found: {0}")]
    IdentityNotFound(IdentityId),

    /// The identity was revoked at or before the signing instant.
    #[error("Key revoked: {identity} (revoked at {revoked_at})")]
    KeyRevoked {
        identity: IdentityId,
        revoked_at: Timestamp,
    },

    /// No scheme implementation is loaded for the algorithm.
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(AlgorithmId),

    /// The identity is registered but this node holds no secret key for it.
    #[error("No local signing key for {0}")]
    MissingSigningKey(IdentityId),

    /// Public key bytes are not a valid key for the algorithm.
    #[error("Invalid public key for {0}")]
    InvalidPublicKey(AlgorithmId),

    /// The algorithm may verify old blocks but must not get new signing keys.
    #[error("{0} is verification-only; signing keys must be post-quantum")]
    VerificationOnly(AlgorithmId),

    /// Secret key bytes could not be decoded for the algorithm.
    #[error("Invalid secret key material for {0}")]
    InvalidKeyMaterial(AlgorithmId),

    /// Transient backend failure (identity store unreachable, signer busy).
    #[error("Signing unavailable: {0}")]
    Unavailable(String),
}

impl SigningError {
    /// Only transient failures are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, SigningError::Unavailable(_))
    }
}
