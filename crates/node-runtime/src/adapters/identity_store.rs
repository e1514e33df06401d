//! # Persistent Identity Repository
//!
//! Stores registered identities in the chain's key-value store under
//! `i:{identity_id}` so revocations and legacy public keys survive restarts
//! alongside the blocks they verify.

use ql_01_signature_service::{IdentityRepository, RepositoryError};
use ql_02_block_storage::{KeyPrefix, KeyValueStore};
use shared_types::{Identity, IdentityId};

pub struct KvIdentityRepository<KV: KeyValueStore> {
    kv: KV,
}

impl<KV: KeyValueStore> KvIdentityRepository<KV> {
    pub fn new(kv: KV) -> Self {
        Self { kv }
    }

    fn decode(key: &[u8], bytes: &[u8]) -> Result<Identity, RepositoryError> {
        bincode::deserialize(bytes)
            .map_err(|_| RepositoryError::Corrupted(String::from_utf8_lossy(key).into_owned()))
    }
}

impl<KV: KeyValueStore> IdentityRepository for KvIdentityRepository<KV> {
    fn get(&self, id: &IdentityId) -> Result<Option<Identity>, RepositoryError> {
        let key = KeyPrefix::identity_key(id.as_str());
        let bytes = self
            .kv
            .get(&key)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?;
        bytes.map(|b| Self::decode(&key, &b)).transpose()
    }

    fn put(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let bytes =
            bincode::serialize(identity).map_err(|e| RepositoryError::Backend(e.to_string()))?;
        self.kv
            .put(&KeyPrefix::identity_key(identity.id.as_str()), &bytes)
            .map_err(|e| RepositoryError::Backend(e.to_string()))
    }

    fn list(&self) -> Result<Vec<Identity>, RepositoryError> {
        self.kv
            .prefix_scan(KeyPrefix::IDENTITY)
            .map_err(|e| RepositoryError::Backend(e.to_string()))?
            .iter()
            .map(|(key, value)| Self::decode(key, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ql_02_block_storage::InMemoryKVStore;
    use shared_types::AlgorithmId;

    #[test]
    fn test_round_trip_and_list_order() {
        let kv = InMemoryKVStore::new();
        let repo = KvIdentityRepository::new(kv.clone());
        let a = Identity::new(vec![1; 32], AlgorithmId::Ed25519);
        let b = Identity::new(vec![2; 32], AlgorithmId::Ed25519);
        repo.put(&b).unwrap();
        repo.put(&a).unwrap();

        let reopened = KvIdentityRepository::new(kv);
        assert_eq!(reopened.get(&a.id).unwrap(), Some(a.clone()));
        let mut expected = vec![a.id.clone(), b.id.clone()];
        expected.sort();
        let listed: Vec<_> = reopened.list().unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_corrupted_entry() {
        let kv = InMemoryKVStore::new();
        kv.put(&KeyPrefix::identity_key("id-bad"), b"\xff").unwrap();
        let repo = KvIdentityRepository::new(kv);
        assert!(matches!(
            repo.get(&IdentityId("id-bad".into())),
            Err(RepositoryError::Corrupted(_))
        ));
    }
}
