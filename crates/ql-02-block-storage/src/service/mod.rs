//! # Block Store Service
//!
//! Implements `BlockStorageApi` over any `KeyValueStore`.

mod storage;

use crate::domain::entities::StoredBlock;
use crate::domain::errors::{SerializationError, StorageError};
use crate::ports::outbound::{
    BincodeBlockSerializer, BlockSerializer, ChecksumProvider, DefaultChecksumProvider,
    KeyValueStore,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Block, TimeSource};
use std::sync::Arc;

/// The Block Store.
pub struct BlockStore<KV, CS = DefaultChecksumProvider, BS = BincodeBlockSerializer>
where
    KV: KeyValueStore,
    CS: ChecksumProvider,
    BS: BlockSerializer,
{
    pub(crate) kv_store: KV,
    pub(crate) checksum: CS,
    pub(crate) serializer: BS,
    pub(crate) time_source: Arc<dyn TimeSource>,
    /// Serializes the read-head / check / write sequence of a commit.
    pub(crate) write_lock: Mutex<()>,
}

/// Dependencies for BlockStore
pub struct BlockStoreDependencies<KV, CS, BS> {
    pub kv_store: KV,
    pub checksum: CS,
    pub serializer: BS,
    pub time_source: Arc<dyn TimeSource>,
}

impl<KV: KeyValueStore> BlockStore<KV> {
    /// CRC32 checksums and bincode encoding.
    pub fn with_defaults(kv_store: KV, time_source: Arc<dyn TimeSource>) -> Self {
        Self::new(BlockStoreDependencies {
            kv_store,
            checksum: DefaultChecksumProvider,
            serializer: BincodeBlockSerializer,
            time_source,
        })
    }
}

impl<KV, CS, BS> BlockStore<KV, CS, BS>
where
    KV: KeyValueStore,
    CS: ChecksumProvider,
    BS: BlockSerializer,
{
    pub fn new(deps: BlockStoreDependencies<KV, CS, BS>) -> Self {
        Self {
            kv_store: deps.kv_store,
            checksum: deps.checksum,
            serializer: deps.serializer,
            time_source: deps.time_source,
            write_lock: Mutex::new(()),
        }
    }

    /// Direct access to the underlying store (repair tooling, tests).
    pub fn kv_store(&self) -> &KV {
        &self.kv_store
    }

    pub(crate) fn block_checksum(&self, block: &Block) -> Result<u32, StorageError> {
        let bytes = self.serializer.checksum_bytes(block)?;
        Ok(self.checksum.compute_crc32(&bytes))
    }

    pub(crate) fn verify_block_checksum(&self, stored: &StoredBlock) -> Result<(), StorageError> {
        let actual = self.block_checksum(&stored.block)?;
        if actual != stored.checksum {
            return Err(StorageError::DataCorruption {
                sequence: stored.sequence(),
                expected_checksum: stored.checksum,
                actual_checksum: actual,
            });
        }
        Ok(())
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|e| SerializationError::from(e).into())
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|e| SerializationError::from(e).into())
}
