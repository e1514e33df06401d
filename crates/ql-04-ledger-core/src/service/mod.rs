//! # Ledger Core Service
//!
//! One sealer, many signers, one committer.
//!
//! ```text
//! append ──► RecordBuffer ──► seal (tip mutex) ──► pending slot
//!                                   │
//!                                   ▼
//!                       spawn_blocking(sign) × N   (timeout + backoff)
//!                          │                 │
//!                          ▼                 ▼
//!                    CommitQueue       FailedPending (sealing paused)
//!                          │                 │
//!                          ▼                 └──► redrive_pending
//!                  commit in sequence order
//!                          │
//!                          ▼
//!              head watch + BlockCommitted
//! ```

mod api;
mod pipeline;

use crate::config::LedgerConfig;
use crate::domain::buffer::RecordBuffer;
use crate::domain::commit_queue::CommitQueue;
use crate::domain::lifecycle::BlockStates;
use crate::domain::{ChainTip, CommittedHead};
use crate::error::{LedgerError, Result};
use crate::ports::outbound::LedgerDependencies;
use parking_lot::{Mutex, RwLock};
use shared_bus::LedgerEvent;
use shared_types::{BlockState, IdentityId, SealedBlock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify, Semaphore};
use tracing::{debug, info, warn};

/// A sealed block whose signing retry budget ran out.
#[derive(Debug, Clone)]
pub(crate) struct ParkedBlock {
    pub block: SealedBlock,
    pub attempts: u32,
    pub reason: String,
}

pub(crate) struct LedgerInner {
    pub(crate) deps: LedgerDependencies,
    pub(crate) config: LedgerConfig,
    pub(crate) signer_id: RwLock<IdentityId>,
    pub(crate) buffer: Mutex<RecordBuffer>,
    /// Held for the whole of a seal pass.
    pub(crate) tip: tokio::sync::Mutex<ChainTip>,
    pub(crate) states: Mutex<BlockStates>,
    pub(crate) parked: Mutex<BTreeMap<u64, ParkedBlock>>,
    pub(crate) commit_queue: Mutex<CommitQueue>,
    /// Sequences with a signing task in flight.
    pub(crate) signing: Mutex<BTreeSet<u64>>,
    /// Caps blocking threads held by signing attempts, timed-out ones included.
    pub(crate) signing_slots: Arc<Semaphore>,
    pub(crate) head_tx: watch::Sender<CommittedHead>,
    /// Batch threshold reached.
    pub(crate) wake: Notify,
    /// A signing task finished (committed or parked).
    pub(crate) progress: Notify,
    pub(crate) redrive_lock: tokio::sync::Mutex<()>,
    /// No more appends.
    pub(crate) closed: AtomicBool,
}

/// The ledger core. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LedgerCore {
    inner: Arc<LedgerInner>,
}

impl LedgerCore {
    /// Open the ledger over an existing store.
    ///
    /// Pending slots left by a previous run come back as `FailedPending` and
    /// are signed again on the next re-drive.
    pub fn open(
        deps: LedgerDependencies,
        config: LedgerConfig,
        signer_id: IdentityId,
    ) -> Result<Self> {
        let head = deps.store.head()?;
        let mut tip = ChainTip {
            next_sequence: head.length,
            last_sealed_hash: head.last_hash,
        };
        let mut states = BlockStates::default();
        let mut parked = BTreeMap::new();

        for block in deps.store.pending_blocks()? {
            let sequence = block.sequence();
            if sequence < head.length {
                warn!("[ql-04] Dropping stale pending slot for committed block #{}", sequence);
                deps.store.remove_pending(sequence)?;
                continue;
            }
            if sequence != tip.next_sequence || block.header.previous_hash != tip.last_sealed_hash {
                return Err(LedgerError::Recovery(format!(
                    "pending block #{} does not continue the chain at #{}",
                    sequence, tip.next_sequence
                )));
            }
            tip = ChainTip {
                next_sequence: sequence + 1,
                last_sealed_hash: block.block_hash,
            };
            states.restore(sequence, BlockState::FailedPending);
            parked.insert(
                sequence,
                ParkedBlock {
                    block,
                    attempts: 0,
                    reason: "restored after restart".to_string(),
                },
            );
        }

        if !parked.is_empty() {
            warn!(
                "[ql-04] Restored {} pending block(s) as FailedPending; \
                 sealing paused until re-drive",
                parked.len()
            );
        }
        info!(
            "[ql-04] Ledger opened at height {} (signer {}, batch {}, flush every {:?})",
            head.length,
            signer_id,
            config.batch_size,
            config.flush_interval()
        );

        let (head_tx, _) = watch::channel(CommittedHead {
            length: head.length,
            last_hash: head.last_hash,
            closed: false,
        });

        Ok(Self {
            inner: Arc::new(LedgerInner {
                buffer: Mutex::new(RecordBuffer::new(config.max_buffered_records)),
                commit_queue: Mutex::new(CommitQueue::new(head.length)),
                signing_slots: Arc::new(Semaphore::new(
                    config.signing.max_signing_threads.max(1),
                )),
                deps,
                config,
                signer_id: RwLock::new(signer_id),
                tip: tokio::sync::Mutex::new(tip),
                states: Mutex::new(states),
                parked: Mutex::new(parked),
                signing: Mutex::new(BTreeSet::new()),
                head_tx,
                wake: Notify::new(),
                progress: Notify::new(),
                redrive_lock: tokio::sync::Mutex::new(()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.inner.config
    }

    pub fn buffered_len(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    /// Sequences currently parked as FailedPending.
    pub fn parked_sequences(&self) -> Vec<u64> {
        self.inner.parked.lock().keys().copied().collect()
    }

    pub fn signer(&self) -> IdentityId {
        self.inner.signer_id.read().clone()
    }

    /// Seal on batch threshold and flush ticks until `shutdown` flips, then
    /// flush one last time and close.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.inner.config.flush_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        debug!("[ql-04] Sealing loop started");

        loop {
            tokio::select! {
                _ = self.inner.wake.notified() => {
                    if let Err(e) = self.inner.seal_ready(true).await {
                        warn!("[ql-04] Seal on batch threshold failed: {}", e);
                    }
                }
                _ = ticker.tick() => self.inner.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.shutdown().await {
            warn!("[ql-04] Final flush incomplete: {}", e);
        }
    }

    /// Stop accepting records, flush, and tell readers the ledger is closed.
    pub async fn shutdown(&self) -> Result<u64> {
        self.inner.closed.store(true, Ordering::Release);
        let result = self.inner.flush().await;

        let mut already_closed = false;
        self.inner.head_tx.send_modify(|head| {
            already_closed = head.closed;
            head.closed = true;
        });
        if !already_closed {
            self.inner.deps.bus.publish(LedgerEvent::LedgerClosed).await;
            info!(
                "[ql-04] Ledger closed at height {}",
                self.inner.head_tx.borrow().length
            );
        }
        result
    }
}
