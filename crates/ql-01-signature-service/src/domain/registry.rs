//! # Algorithm Registry
//!
//! Maps `AlgorithmId` to the loaded scheme implementation. A node only signs
//! or verifies under algorithms present here.

use crate::domain::errors::SigningError;
use crate::domain::schemes::{Dilithium2Scheme, Dilithium3Scheme, Ed25519Scheme, SignatureScheme};
use shared_types::AlgorithmId;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct AlgorithmRegistry {
    schemes: BTreeMap<AlgorithmId, Arc<dyn SignatureScheme>>,
}

impl AlgorithmRegistry {
    /// Empty registry. Every lookup fails with `UnknownAlgorithm`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Dilithium2 and Dilithium3 only.
    pub fn post_quantum() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Dilithium2Scheme));
        registry.register(Arc::new(Dilithium3Scheme));
        registry
    }

    /// Post-quantum schemes plus legacy Ed25519.
    pub fn with_all() -> Self {
        let mut registry = Self::post_quantum();
        registry.register(Arc::new(Ed25519Scheme));
        registry
    }

    /// Load a scheme, replacing any previous implementation for its id.
    pub fn register(&mut self, scheme: Arc<dyn SignatureScheme>) {
        self.schemes.insert(scheme.algorithm(), scheme);
    }

    pub fn get(&self, algorithm: AlgorithmId) -> Result<&Arc<dyn SignatureScheme>, SigningError> {
        self.schemes
            .get(&algorithm)
            .ok_or(SigningError::UnknownAlgorithm(algorithm))
    }

    pub fn supports(&self, algorithm: AlgorithmId) -> bool {
        self.schemes.contains_key(&algorithm)
    }

    pub fn algorithms(&self) -> Vec<AlgorithmId> {
        self.schemes.keys().copied().collect()
    }
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("algorithms", &self.algorithms())
            .finish()
    }
}
