//! # Signature Schemes
//!
//! One `SignatureScheme` per `AlgorithmId`. Keys and signatures cross this
//! boundary as raw bytes so that the registry, the identity store and the
//! block format never depend on a particular crate's key types.

use crate::domain::errors::SigningError;
use crate::domain::keystore::SecretKeyMaterial;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};
use shared_types::AlgorithmId;

/// A pluggable signature algorithm.
pub trait SignatureScheme: Send + Sync {
    fn algorithm(&self) -> AlgorithmId;

    /// Fresh keypair as `(public_key, secret_key)`.
    fn generate_keypair(&self) -> (Vec<u8>, SecretKeyMaterial);

    fn sign(&self, secret_key: &SecretKeyMaterial, message: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// `false` for malformed keys or signatures as well as mismatches.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;

    fn is_valid_public_key(&self, public_key: &[u8]) -> bool;
}

macro_rules! dilithium_scheme {
    ($name:ident, $module:ident, $algorithm:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl SignatureScheme for $name {
            fn algorithm(&self) -> AlgorithmId {
                $algorithm
            }

            fn generate_keypair(&self) -> (Vec<u8>, SecretKeyMaterial) {
                let (pk, sk) = pqcrypto_dilithium::$module::keypair();
                (
                    pk.as_bytes().to_vec(),
                    SecretKeyMaterial::new(sk.as_bytes().to_vec()),
                )
            }

            fn sign(
                &self,
                secret_key: &SecretKeyMaterial,
                message: &[u8],
            ) -> Result<Vec<u8>, SigningError> {
                let sk = pqcrypto_dilithium::$module::SecretKey::from_bytes(secret_key.as_bytes())
                    .map_err(|_| SigningError::InvalidKeyMaterial($algorithm))?;
                let signature = pqcrypto_dilithium::$module::detached_sign(message, &sk);
                Ok(signature.as_bytes().to_vec())
            }

            fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
                let Ok(pk) = pqcrypto_dilithium::$module::PublicKey::from_bytes(public_key) else {
                    return false;
                };
                let Ok(sig) = pqcrypto_dilithium::$module::DetachedSignature::from_bytes(signature)
                else {
                    return false;
                };
                pqcrypto_dilithium::$module::verify_detached_signature(&sig, message, &pk).is_ok()
            }

            fn is_valid_public_key(&self, public_key: &[u8]) -> bool {
                pqcrypto_dilithium::$module::PublicKey::from_bytes(public_key).is_ok()
            }
        }
    };
}

dilithium_scheme!(
    Dilithium2Scheme,
    dilithium2,
    AlgorithmId::Dilithium2,
    "CRYSTALS-Dilithium, NIST security level 2. Default block signer."
);

dilithium_scheme!(
    Dilithium3Scheme,
    dilithium3,
    AlgorithmId::Dilithium3,
    "CRYSTALS-Dilithium, NIST security level 3."
);

/// Classical Ed25519. Kept so identities provisioned before the
/// post-quantum migration can still be verified.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Scheme;

impl SignatureScheme for Ed25519Scheme {
    fn algorithm(&self) -> AlgorithmId {
        AlgorithmId::Ed25519
    }

    fn generate_keypair(&self) -> (Vec<u8>, SecretKeyMaterial) {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        (
            signing_key.verifying_key().to_bytes().to_vec(),
            SecretKeyMaterial::new(signing_key.to_bytes().to_vec()),
        )
    }

    fn sign(
        &self,
        secret_key: &SecretKeyMaterial,
        message: &[u8],
    ) -> Result<Vec<u8>, SigningError> {
        let seed: [u8; 32] = secret_key
            .as_bytes()
            .try_into()
            .map_err(|_| SigningError::InvalidKeyMaterial(AlgorithmId::Ed25519))?;
        let signing_key = SigningKey::from_bytes(&seed);
        Ok(signing_key.sign(message).to_bytes().to_vec())
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        let Some(verifying_key) = ed25519_key(public_key) else {
            return false;
        };
        let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(message, &signature).is_ok()
    }

    fn is_valid_public_key(&self, public_key: &[u8]) -> bool {
        ed25519_key(public_key).is_some()
    }
}

fn ed25519_key(bytes: &[u8]) -> Option<VerifyingKey> {
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}
