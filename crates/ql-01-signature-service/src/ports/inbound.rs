//! # Inbound Ports (Driving Ports / API)

use crate::domain::errors::SigningError;
use crate::domain::keystore::SecretKeyMaterial;
use shared_types::{AlgorithmId, Identity, IdentityId, Timestamp};

/// Signing and verification, as used by the ledger core and the verifier.
///
/// Calls are synchronous and CPU-bound; async callers should run them on a
/// blocking worker. Implementations must be thread-safe.
pub trait SigningApi: Send + Sync {
    /// Sign `message` as `identity` at the current time.
    ///
    /// # Errors
    /// * `IdentityNotFound` - no such identity
    /// * `KeyRevoked` - `now >= revoked_at`
    /// * `UnknownAlgorithm` - the identity's scheme is not loaded
    /// * `MissingSigningKey` - identity known but no local secret key
    /// * `Unavailable` - transient failure, safe to retry
    fn sign(&self, identity: &IdentityId, message: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// Verify under the identity's registered algorithm.
    ///
    /// Revocation is not consulted: a signature made before revocation stays valid.
    fn verify(
        &self,
        identity: &IdentityId,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SigningError>;

    /// Verify under the algorithm recorded alongside the signature.
    ///
    /// Returns `Ok(false)` if it differs from the identity's registered algorithm.
    fn verify_with(
        &self,
        identity: &IdentityId,
        algorithm: AlgorithmId,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SigningError>;

    /// Look up a registered identity.
    fn identity(&self, identity: &IdentityId) -> Result<Identity, SigningError>;
}

/// Hooks for the external identity provisioning process.
pub trait IdentityProvisioning: Send + Sync {
    /// Register a public key. Registering the same key twice returns the same id.
    fn register_identity(
        &self,
        public_key: Vec<u8>,
        algorithm: AlgorithmId,
    ) -> Result<IdentityId, SigningError>;

    /// Revoke from `at` onward. Never moves an existing revocation later.
    fn revoke_identity(&self, identity: &IdentityId, at: Timestamp) -> Result<(), SigningError>;

    /// Generate a keypair for this node, register it and keep the secret key.
    /// `VerificationOnly` for classical algorithms.
    fn generate_identity(&self, algorithm: AlgorithmId) -> Result<IdentityId, SigningError>;

    /// Register an externally held keypair and keep the secret key locally.
    /// `VerificationOnly` for classical algorithms.
    fn import_signing_key(
        &self,
        public_key: Vec<u8>,
        algorithm: AlgorithmId,
        secret: SecretKeyMaterial,
    ) -> Result<IdentityId, SigningError>;
}
