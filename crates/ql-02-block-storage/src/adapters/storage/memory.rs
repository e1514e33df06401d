//! In-memory key-value store.

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Volatile store for tests and demos.
///
/// Clones share the same map, so a test can keep a handle and poke at raw
/// bytes underneath a running ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKVStore {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        // One write guard for the whole batch: readers see all or nothing.
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .data
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_kv_store() {
        let store = InMemoryKVStore::new();

        store.put(b"key1", b"value1").unwrap();
        store.put(b"key2", b"value2").unwrap();

        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get(b"key3").unwrap(), None);
        assert!(store.exists(b"key2").unwrap());

        store.delete(b"key2").unwrap();
        assert!(!store.exists(b"key2").unwrap());
    }

    #[test]
    fn test_batch_write_and_clone_share_state() {
        let store = InMemoryKVStore::new();
        let handle = store.clone();

        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a".to_vec(), b"1".to_vec()),
                BatchOperation::put(b"b".to_vec(), b"2".to_vec()),
                BatchOperation::delete(b"a".to_vec()),
            ])
            .unwrap();

        assert_eq!(handle.get(b"a").unwrap(), None);
        assert_eq!(handle.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_prefix_scan_is_ordered() {
        let store = InMemoryKVStore::new();
        store.put(b"b:\x02", b"two").unwrap();
        store.put(b"b:\x01", b"one").unwrap();
        store.put(b"c:\x00", b"other").unwrap();
        store.put(b"a:\xff", b"other").unwrap();

        let blocks = store.prefix_scan(b"b:").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].1, b"one".to_vec());
        assert_eq!(blocks[1].1, b"two".to_vec());
    }
}
