//! # Inbound Ports (Driving Ports / API)
//!
//! Used by the ingest gateway (writes), the query interface (reads) and
//! operators (re-drive, signer rotation, audits).

use crate::domain::CommittedHead;
use crate::error::Result;
use async_trait::async_trait;
use ql_03_integrity_verifier::ChainReport;
use shared_types::{Block, BlockState, IdentityId, Record};
use tokio::sync::watch;

#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Buffer validated records. Returns the buffered count afterwards.
    ///
    /// # Errors
    /// * `CapacityExceeded` - the buffer would pass `max_buffered_records`
    /// * `Closed` - the ledger is shutting down
    async fn append(&self, records: Vec<Record>) -> Result<usize>;

    /// Seal everything buffered and wait until those blocks are committed or
    /// parked. Returns the committed chain length.
    ///
    /// # Errors
    /// * `SigningUnavailable` - some block is parked as FailedPending
    async fn flush(&self) -> Result<u64>;

    /// Re-attempt signing of parked blocks in sequence order. Returns how
    /// many were recovered.
    async fn redrive_pending(&self) -> Result<usize>;

    /// A committed block.
    async fn get_block(&self, sequence: u64) -> Result<Block>;

    /// Committed chain length.
    fn head_sequence(&self) -> u64;

    /// Per-index verification report over committed blocks.
    async fn verify_chain(&self, from: u64, to: u64) -> Result<ChainReport>;

    /// Lifecycle state of a sealed or committed block.
    fn block_state(&self, sequence: u64) -> Option<BlockState>;

    /// Sign future blocks (and re-drives) as `identity`.
    fn set_signer(&self, identity: IdentityId);

    /// Committed head updates; `closed` flips on shutdown.
    fn subscribe_head(&self) -> watch::Receiver<CommittedHead>;
}
