//! # Local Key Store
//!
//! Secret keys for the identities this node signs as.

use parking_lot::RwLock;
use shared_types::IdentityId;
use std::collections::HashMap;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Raw secret key bytes, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyMaterial(Vec<u8>);

impl SecretKeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKeyMaterial([REDACTED; {}])", self.0.len())
    }
}

/// In-process map from identity to secret key.
#[derive(Default)]
pub struct LocalKeyStore {
    keys: RwLock<HashMap<IdentityId, SecretKeyMaterial>>,
}

impl LocalKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a key, replacing (and zeroizing) any previous one.
    pub fn insert(&self, identity: IdentityId, secret: SecretKeyMaterial) {
        self.keys.write().insert(identity, secret);
    }

    pub fn contains(&self, identity: &IdentityId) -> bool {
        self.keys.read().contains_key(identity)
    }

    /// Run `f` against the key without copying it out of the store.
    pub fn with_key<T>(
        &self,
        identity: &IdentityId,
        f: impl FnOnce(&SecretKeyMaterial) -> T,
    ) -> Option<T> {
        self.keys.read().get(identity).map(f)
    }

    pub fn remove(&self, identity: &IdentityId) -> bool {
        self.keys.write().remove(identity).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}
