//! # Inbound Ports (Driving Ports / API)
//!
//! The block store API consumed by the ledger core (writer), the integrity
//! verifier and the query interface (readers).

use crate::domain::entities::{ChainHead, StoredBlock};
use crate::domain::errors::StorageError;
use shared_types::{Block, Checkpoint, RecordId, SealedBlock};

pub trait BlockStorageApi: Send + Sync {
    // =========================================================================
    // Committed chain
    // =========================================================================

    /// Atomically persist a signed block, its record index entries, the new
    /// head, and remove its pending slot.
    ///
    /// # Errors
    /// * `SequenceMismatch` - block is not exactly at the head length
    /// * `LinkMismatch` - `previous_hash` differs from the head hash
    fn commit_block(&self, block: &Block) -> Result<ChainHead, StorageError>;

    /// Read a committed block, verifying its checksum.
    fn read_block(&self, sequence: u64) -> Result<Block, StorageError>;

    /// Read the raw stored entry (checksum included) without verifying it.
    fn read_stored(&self, sequence: u64) -> Result<StoredBlock, StorageError>;

    /// Committed blocks in `[from, to]`, stopping at the head.
    fn read_block_range(&self, from: u64, to: u64) -> Result<Vec<Block>, StorageError>;

    fn head(&self) -> Result<ChainHead, StorageError>;

    // =========================================================================
    // Record index
    // =========================================================================

    /// Sequence of the committed block holding a record.
    fn locate_record(&self, id: &str) -> Result<Option<u64>, StorageError>;

    /// Every committed record id (used to rebuild the dedup index).
    fn committed_record_ids(&self) -> Result<Vec<RecordId>, StorageError>;

    // =========================================================================
    // Pending slots
    // =========================================================================

    /// Persist a sealed block before signing starts.
    fn put_pending(&self, block: &SealedBlock) -> Result<(), StorageError>;

    fn remove_pending(&self, sequence: u64) -> Result<(), StorageError>;

    /// All pending blocks in sequence order.
    fn pending_blocks(&self) -> Result<Vec<SealedBlock>, StorageError>;

    // =========================================================================
    // Audit checkpoint
    // =========================================================================

    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, StorageError>;

    fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;
}
