//! `LedgerApi` implementation.

use super::LedgerCore;
use crate::domain::CommittedHead;
use crate::error::{LedgerError, Result};
use crate::ports::inbound::LedgerApi;
use async_trait::async_trait;
use ql_02_block_storage::StorageError;
use ql_03_integrity_verifier::ChainReport;
use shared_types::{Block, BlockState, IdentityId, Record};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[async_trait]
impl LedgerApi for LedgerCore {
    async fn append(&self, records: Vec<Record>) -> Result<usize> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(LedgerError::Closed);
        }
        let buffered = self.inner.buffer.lock().push_all(records).map_err(|full| {
            warn!(
                "[ql-04] Buffer full: {} buffered, {} requested, limit {}",
                full.buffered, full.requested, full.limit
            );
            LedgerError::CapacityExceeded {
                requested: full.requested,
                buffered: full.buffered,
                limit: full.limit,
            }
        })?;

        if buffered >= self.inner.config.batch_size {
            self.inner.wake.notify_one();
        }
        Ok(buffered)
    }

    async fn flush(&self) -> Result<u64> {
        self.inner.flush().await
    }

    async fn redrive_pending(&self) -> Result<usize> {
        self.inner.redrive().await
    }

    async fn get_block(&self, sequence: u64) -> Result<Block> {
        if sequence >= self.head_sequence() {
            return Err(LedgerError::NotFound { sequence });
        }
        self.inner.deps.store.read_block(sequence).map_err(|e| match e {
            StorageError::BlockNotFound { sequence } => LedgerError::NotFound { sequence },
            other => other.into(),
        })
    }

    fn head_sequence(&self) -> u64 {
        self.inner.head_tx.borrow().length
    }

    async fn verify_chain(&self, from: u64, to: u64) -> Result<ChainReport> {
        let verifier = Arc::clone(&self.inner.deps.verifier);
        tokio::task::spawn_blocking(move || verifier.verify_chain(from, to))
            .await
            .map_err(|e| LedgerError::TaskFailed(e.to_string()))?
            .map_err(LedgerError::from)
    }

    fn block_state(&self, sequence: u64) -> Option<BlockState> {
        if sequence < self.head_sequence() {
            return Some(BlockState::Committed);
        }
        self.inner.states.lock().get(sequence)
    }

    fn set_signer(&self, identity: IdentityId) {
        info!("[ql-04] Signer changed to {}", identity);
        *self.inner.signer_id.write() = identity;
    }

    fn subscribe_head(&self) -> watch::Receiver<CommittedHead> {
        self.inner.head_tx.subscribe()
    }
}
