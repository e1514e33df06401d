//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the block store.

use crate::domain::entities::StoredBlock;
use crate::domain::errors::{KVStoreError, SerializationError};

/// Abstract interface for key-value database operations.
///
/// Methods take `&self`: the ledger writer, the verifier and query readers
/// share one store, so implementations synchronize internally.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch succeed, or NONE are applied.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// All entries under a prefix, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// One store shared between the block store and other persisted state
/// (the node's identity repository).
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        (**self).delete(key)
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        (**self).atomic_batch_write(operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        (**self).exists(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        (**self).prefix_scan(prefix)
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Abstract interface for checksum computation.
pub trait ChecksumProvider: Send + Sync {
    fn compute_crc32(&self, data: &[u8]) -> u32;

    fn verify_crc32(&self, data: &[u8], expected: u32) -> bool {
        self.compute_crc32(data) == expected
    }
}

/// Abstract interface for block serialization.
pub trait BlockSerializer: Send + Sync {
    fn serialize(&self, block: &StoredBlock) -> Result<Vec<u8>, SerializationError>;

    fn deserialize(&self, data: &[u8]) -> Result<StoredBlock, SerializationError>;

    /// Bytes the checksum is computed over.
    fn checksum_bytes(&self, block: &shared_types::Block) -> Result<Vec<u8>, SerializationError>;
}

/// Default checksum provider using crc32fast.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChecksumProvider;

impl ChecksumProvider for DefaultChecksumProvider {
    fn compute_crc32(&self, data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

/// Default block serializer using bincode.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeBlockSerializer;

impl BlockSerializer for BincodeBlockSerializer {
    fn serialize(&self, block: &StoredBlock) -> Result<Vec<u8>, SerializationError> {
        Ok(bincode::serialize(block)?)
    }

    fn deserialize(&self, data: &[u8]) -> Result<StoredBlock, SerializationError> {
        Ok(bincode::deserialize(data)?)
    }

    fn checksum_bytes(&self, block: &shared_types::Block) -> Result<Vec<u8>, SerializationError> {
        Ok(bincode::serialize(block)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_provider() {
        let provider = DefaultChecksumProvider;

        let data = b"hello world";
        let checksum = provider.compute_crc32(data);

        assert!(provider.verify_crc32(data, checksum));
        assert!(!provider.verify_crc32(data, checksum.wrapping_add(1)));
    }
}
