//! # Signature Service
//!
//! Application service implementing `SigningApi` and `IdentityProvisioning`.
//! Identities come from the `IdentityRepository` port; secret keys from the
//! local key store; the scheme from the algorithm registry.

use crate::domain::errors::SigningError;
use crate::domain::keystore::{LocalKeyStore, SecretKeyMaterial};
use crate::domain::registry::AlgorithmRegistry;
use crate::ports::inbound::{IdentityProvisioning, SigningApi};
use crate::ports::outbound::{IdentityRepository, RepositoryError};
use shared_types::{AlgorithmId, Identity, IdentityId, IdentityStatus, TimeSource, Timestamp};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl From<RepositoryError> for SigningError {
    fn from(err: RepositoryError) -> Self {
        SigningError::Unavailable(err.to_string())
    }
}

pub struct SignatureService<R: IdentityRepository> {
    registry: AlgorithmRegistry,
    identities: R,
    keys: LocalKeyStore,
    time_source: Arc<dyn TimeSource>,
}

impl<R: IdentityRepository> SignatureService<R> {
    pub fn new(
        registry: AlgorithmRegistry,
        identities: R,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            registry,
            identities,
            keys: LocalKeyStore::new(),
            time_source,
        }
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    pub fn has_signing_key(&self, identity: &IdentityId) -> bool {
        self.keys.contains(identity)
    }

    pub fn identities(&self) -> Result<Vec<Identity>, SigningError> {
        Ok(self.identities.list()?)
    }

    fn load(&self, id: &IdentityId) -> Result<Identity, SigningError> {
        self.identities
            .get(id)?
            .ok_or_else(|| SigningError::IdentityNotFound(id.clone()))
    }

    fn verify_as(
        &self,
        identity: &Identity,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SigningError> {
        let scheme = self.registry.get(identity.algorithm)?;
        Ok(scheme.verify(&identity.public_key, message, signature))
    }
}

impl<R: IdentityRepository> SigningApi for SignatureService<R> {
    fn sign(&self, id: &IdentityId, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        let identity = self.load(id)?;

        let now = self.time_source.now();
        if let Some(revoked_at) = identity.revoked_at.filter(|at| now >= *at) {
            warn!(identity = %id, revoked_at, "[ql-01] Refusing to sign with revoked key");
            return Err(SigningError::KeyRevoked {
                identity: id.clone(),
                revoked_at,
            });
        }

        let scheme = self.registry.get(identity.algorithm)?;
        let signature = self
            .keys
            .with_key(id, |secret| scheme.sign(secret, message))
            .ok_or_else(|| SigningError::MissingSigningKey(id.clone()))??;

        debug!(
            identity = %id,
            algorithm = %identity.algorithm,
            len = signature.len(),
            "[ql-01] Signed message"
        );
        Ok(signature)
    }

    fn verify(
        &self,
        id: &IdentityId,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SigningError> {
        let identity = self.load(id)?;
        self.verify_as(&identity, message, signature)
    }

    fn verify_with(
        &self,
        id: &IdentityId,
        algorithm: AlgorithmId,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SigningError> {
        let identity = self.load(id)?;
        if identity.algorithm != algorithm {
            debug!(
                identity = %id,
                recorded = %algorithm,
                registered = %identity.algorithm,
                "[ql-01] Algorithm mismatch"
            );
            return Ok(false);
        }
        self.verify_as(&identity, message, signature)
    }

    fn identity(&self, id: &IdentityId) -> Result<Identity, SigningError> {
        self.load(id)
    }
}

impl<R: IdentityRepository> IdentityProvisioning for SignatureService<R> {
    fn register_identity(
        &self,
        public_key: Vec<u8>,
        algorithm: AlgorithmId,
    ) -> Result<IdentityId, SigningError> {
        let scheme = self.registry.get(algorithm)?;
        if !scheme.is_valid_public_key(&public_key) {
            return Err(SigningError::InvalidPublicKey(algorithm));
        }

        let identity = Identity::new(public_key, algorithm);
        if let Some(existing) = self.identities.get(&identity.id)? {
            debug!(identity = %existing.id, "[ql-01] Identity already registered");
            return Ok(existing.id);
        }

        self.identities.put(&identity)?;
        info!(identity = %identity.id, %algorithm, "[ql-01] Identity registered");
        Ok(identity.id)
    }

    fn revoke_identity(&self, id: &IdentityId, at: Timestamp) -> Result<(), SigningError> {
        let mut identity = self.load(id)?;
        let effective = identity.revoked_at.map_or(at, |existing| existing.min(at));
        identity.revoked_at = Some(effective);
        identity.status = IdentityStatus::Revoked;
        self.identities.put(&identity)?;
        warn!(identity = %id, revoked_at = effective, "[ql-01] Identity revoked");
        Ok(())
    }

    fn generate_identity(&self, algorithm: AlgorithmId) -> Result<IdentityId, SigningError> {
        ensure_signing_algorithm(algorithm)?;
        let (public_key, secret) = self.registry.get(algorithm)?.generate_keypair();
        self.import_signing_key(public_key, algorithm, secret)
    }

    fn import_signing_key(
        &self,
        public_key: Vec<u8>,
        algorithm: AlgorithmId,
        secret: SecretKeyMaterial,
    ) -> Result<IdentityId, SigningError> {
        ensure_signing_algorithm(algorithm)?;
        let id = self.register_identity(public_key, algorithm)?;
        self.keys.insert(id.clone(), secret);
        info!(identity = %id, %algorithm, "[ql-01] Local signing key loaded");
        Ok(id)
    }
}

/// Classical schemes stay registered for verifying old blocks only.
fn ensure_signing_algorithm(algorithm: AlgorithmId) -> Result<(), SigningError> {
    if algorithm.is_post_quantum() {
        Ok(())
    } else {
        Err(SigningError::VerificationOnly(algorithm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryIdentityRepository;
    use crate::domain::schemes::{Dilithium2Scheme, SignatureScheme};
    use shared_types::ManualTimeSource;

    fn service(clock: &ManualTimeSource) -> SignatureService<InMemoryIdentityRepository> {
        SignatureService::new(
            AlgorithmRegistry::with_all(),
            InMemoryIdentityRepository::new(),
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn test_generate_sign_verify() {
        let clock = ManualTimeSource::new(1_000);
        let svc = service(&clock);
        let id = svc.generate_identity(AlgorithmId::Dilithium2).unwrap();

        let sig = svc.sign(&id, b"block-0").unwrap();
        assert!(svc.verify(&id, b"block-0", &sig).unwrap());
        assert!(svc.verify_with(&id, AlgorithmId::Dilithium2, b"block-0", &sig).unwrap());
        assert!(!svc.verify(&id, b"block-1", &sig).unwrap());
    }

    #[test]
    fn test_recorded_algorithm_must_match_identity() {
        let svc = service(&ManualTimeSource::new(1));
        let id = svc.generate_identity(AlgorithmId::Dilithium3).unwrap();
        let sig = svc.sign(&id, b"m").unwrap();
        assert!(!svc.verify_with(&id, AlgorithmId::Dilithium2, b"m", &sig).unwrap());
    }

    #[test]
    fn test_register_is_idempotent() {
        let svc = service(&ManualTimeSource::new(1));
        let (pk, _) = Dilithium2Scheme.generate_keypair();
        let a = svc.register_identity(pk.clone(), AlgorithmId::Dilithium2).unwrap();
        let b = svc.register_identity(pk, AlgorithmId::Dilithium2).unwrap();
        assert_eq!(a, b);
        assert_eq!(svc.identities().unwrap().len(), 1);
    }

    #[test]
    fn test_register_rejects_bad_key() {
        let svc = service(&ManualTimeSource::new(1));
        assert_eq!(
            svc.register_identity(vec![1, 2, 3], AlgorithmId::Dilithium2),
            Err(SigningError::InvalidPublicKey(AlgorithmId::Dilithium2))
        );
    }

    #[test]
    fn test_revocation_is_forward_only() {
        let clock = ManualTimeSource::new(100);
        let svc = service(&clock);
        let id = svc.generate_identity(AlgorithmId::Dilithium2).unwrap();
        let old_sig = svc.sign(&id, b"block-5").unwrap();

        svc.revoke_identity(&id, 200).unwrap();
        // Still before the revocation instant.
        assert!(svc.sign(&id, b"block-6").is_ok());

        clock.set(200);
        assert!(matches!(
            svc.sign(&id, b"block-7"),
            Err(SigningError::KeyRevoked { revoked_at: 200, .. })
        ));
        assert!(svc.verify(&id, b"block-5", &old_sig).unwrap());
    }

    #[test]
    fn test_revocation_never_moves_later() {
        let svc = service(&ManualTimeSource::new(0));
        let id = svc.generate_identity(AlgorithmId::Dilithium2).unwrap();
        svc.revoke_identity(&id, 50).unwrap();
        svc.revoke_identity(&id, 90).unwrap();
        assert_eq!(svc.identity(&id).unwrap().revoked_at, Some(50));
    }

    #[test]
    fn test_sign_errors() {
        let svc = service(&ManualTimeSource::new(0));
        let ghost = IdentityId::from("id-ghost");
        assert_eq!(
            svc.sign(&ghost, b"m"),
            Err(SigningError::IdentityNotFound(ghost.clone()))
        );

        let (pk, _) = Dilithium2Scheme.generate_keypair();
        let remote = svc.register_identity(pk, AlgorithmId::Dilithium2).unwrap();
        assert_eq!(
            svc.sign(&remote, b"m"),
            Err(SigningError::MissingSigningKey(remote.clone()))
        );
    }

    #[test]
    fn test_no_signing_keys_for_legacy_algorithm() {
        let svc = service(&ManualTimeSource::new(0));
        assert_eq!(
            svc.generate_identity(AlgorithmId::Ed25519),
            Err(SigningError::VerificationOnly(AlgorithmId::Ed25519))
        );

        let (pk, sk) = crate::domain::schemes::Ed25519Scheme.generate_keypair();
        assert_eq!(
            svc.import_signing_key(pk.clone(), AlgorithmId::Ed25519, sk),
            Err(SigningError::VerificationOnly(AlgorithmId::Ed25519))
        );
        // Nothing was registered on the way.
        assert!(svc.identities().unwrap().is_empty());
        // Registering the public key for verification is still fine.
        assert!(svc.register_identity(pk, AlgorithmId::Ed25519).is_ok());
    }

    #[test]
    fn test_legacy_identity_unverifiable_without_scheme() {
        let full = service(&ManualTimeSource::new(0));
        let (pk, _) = crate::domain::schemes::Ed25519Scheme.generate_keypair();

        let pq_only = SignatureService::new(
            AlgorithmRegistry::post_quantum(),
            InMemoryIdentityRepository::new(),
            Arc::new(ManualTimeSource::new(0)),
        );
        assert_eq!(
            pq_only.register_identity(pk.clone(), AlgorithmId::Ed25519),
            Err(SigningError::UnknownAlgorithm(AlgorithmId::Ed25519))
        );
        assert!(full.register_identity(pk, AlgorithmId::Ed25519).is_ok());
    }
}
