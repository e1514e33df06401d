//! # Block Storage API Implementation

use super::{decode, encode, BlockStore};
use crate::domain::entities::{ChainHead, KeyPrefix, StoredBlock};
use crate::domain::errors::StorageError;
use crate::ports::inbound::BlockStorageApi;
use crate::ports::outbound::{BatchOperation, BlockSerializer, ChecksumProvider, KeyValueStore};
use shared_types::hashing::short_hex;
use shared_types::{hash_eq, Block, Checkpoint, RecordId, SealedBlock};
use tracing::{debug, info};

impl<KV, CS, BS> BlockStorageApi for BlockStore<KV, CS, BS>
where
    KV: KeyValueStore,
    CS: ChecksumProvider,
    BS: BlockSerializer,
{
    fn commit_block(&self, block: &Block) -> Result<ChainHead, StorageError> {
        let _guard = self.write_lock.lock();
        let head = self.head()?;
        let sequence = block.sequence();

        if sequence != head.length {
            return Err(StorageError::SequenceMismatch {
                expected: head.length,
                actual: sequence,
            });
        }
        if !hash_eq(&block.previous_hash(), &head.last_hash) {
            return Err(StorageError::LinkMismatch {
                expected: head.last_hash,
                actual: block.previous_hash(),
            });
        }

        let checksum = self.block_checksum(block)?;
        let stored = StoredBlock::new(block.clone(), self.time_source.now(), checksum);
        let data = self.serializer.serialize(&stored)?;
        let new_head = ChainHead {
            length: sequence + 1,
            last_hash: block.block_hash,
        };

        let mut operations = Vec::with_capacity(block.records.len() + 3);
        operations.push(BatchOperation::put(KeyPrefix::block_key(sequence), data));
        for record in &block.records {
            operations.push(BatchOperation::put(
                KeyPrefix::record_key(record.id()),
                sequence.to_be_bytes().to_vec(),
            ));
        }
        operations.push(BatchOperation::put(KeyPrefix::HEAD, encode(&new_head)?));
        operations.push(BatchOperation::delete(KeyPrefix::pending_key(sequence)));

        self.kv_store.atomic_batch_write(operations)?;

        info!(
            sequence,
            records = block.records.len(),
            hash = %short_hex(&block.block_hash),
            "[ql-02] Block committed"
        );
        Ok(new_head)
    }

    fn read_block(&self, sequence: u64) -> Result<Block, StorageError> {
        let stored = self.read_stored(sequence)?;
        self.verify_block_checksum(&stored)?;
        Ok(stored.block)
    }

    fn read_stored(&self, sequence: u64) -> Result<StoredBlock, StorageError> {
        let data = self
            .kv_store
            .get(&KeyPrefix::block_key(sequence))?
            .ok_or(StorageError::BlockNotFound { sequence })?;
        Ok(self.serializer.deserialize(&data)?)
    }

    fn read_block_range(&self, from: u64, to: u64) -> Result<Vec<Block>, StorageError> {
        let head = self.head()?;
        let Some(last) = head.last_sequence() else {
            return Ok(Vec::new());
        };
        let to = to.min(last);
        if from > to {
            return Ok(Vec::new());
        }

        (from..=to).map(|sequence| self.read_block(sequence)).collect()
    }

    fn head(&self) -> Result<ChainHead, StorageError> {
        match self.kv_store.get(KeyPrefix::HEAD)? {
            Some(bytes) => decode(&bytes),
            None => Ok(ChainHead::genesis()),
        }
    }

    fn locate_record(&self, id: &str) -> Result<Option<u64>, StorageError> {
        let Some(bytes) = self.kv_store.get(&KeyPrefix::record_key(id))? else {
            return Ok(None);
        };
        let raw: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StorageError::SerializationError {
                message: format!("record index entry for {} is {} bytes", id, bytes.len()),
            })?;
        Ok(Some(u64::from_be_bytes(raw)))
    }

    fn committed_record_ids(&self) -> Result<Vec<RecordId>, StorageError> {
        self.kv_store
            .prefix_scan(KeyPrefix::RECORD)?
            .into_iter()
            .map(|(key, _)| {
                String::from_utf8(key[KeyPrefix::RECORD.len()..].to_vec()).map_err(|e| {
                    StorageError::SerializationError {
                        message: format!("record index key is not utf-8: {}", e),
                    }
                })
            })
            .collect()
    }

    fn put_pending(&self, block: &SealedBlock) -> Result<(), StorageError> {
        self.kv_store
            .put(&KeyPrefix::pending_key(block.sequence()), &encode(block)?)?;
        debug!(sequence = block.sequence(), "[ql-02] Pending slot written");
        Ok(())
    }

    fn remove_pending(&self, sequence: u64) -> Result<(), StorageError> {
        self.kv_store.delete(&KeyPrefix::pending_key(sequence))?;
        Ok(())
    }

    fn pending_blocks(&self) -> Result<Vec<SealedBlock>, StorageError> {
        self.kv_store
            .prefix_scan(KeyPrefix::PENDING)?
            .into_iter()
            .map(|(_, value)| decode(&value))
            .collect()
    }

    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError> {
        self.kv_store
            .get(KeyPrefix::CHECKPOINT)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.kv_store.put(KeyPrefix::CHECKPOINT, &encode(checkpoint)?)?;
        debug!(sequence = checkpoint.sequence, "[ql-02] Checkpoint saved");
        Ok(())
    }
}
