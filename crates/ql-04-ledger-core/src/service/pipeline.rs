//! Seal, sign, commit.

use super::{LedgerInner, ParkedBlock};
use crate::domain::backoff::Backoff;
use crate::error::{LedgerError, Result};
use ql_01_signature_service::SigningError;
use shared_bus::LedgerEvent;
use shared_types::hashing::short_hex;
use shared_types::{Block, BlockHeader, BlockSeal, BlockState, IdentityId, SealedBlock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Signing gave up on a block.
#[derive(Debug)]
pub(crate) struct SignFailure {
    pub attempts: u32,
    pub error: SigningError,
}

impl LedgerInner {
    pub(crate) fn is_paused(&self) -> bool {
        !self.parked.lock().is_empty()
    }

    fn current_signer(&self) -> IdentityId {
        self.signer_id.read().clone()
    }

    fn first_parked(&self) -> Option<(u64, String)> {
        self.parked
            .lock()
            .iter()
            .next()
            .map(|(sequence, parked)| (*sequence, parked.reason.clone()))
    }

    // =========================================================================
    // Sealing
    // =========================================================================

    /// Seal buffered records into blocks and start signing them.
    ///
    /// With `full_only` a partial batch stays buffered. Returns the sealed
    /// sequences.
    pub(crate) async fn seal_ready(self: &Arc<Self>, full_only: bool) -> Result<Vec<u64>> {
        let mut tip = self.tip.lock().await;
        let batch_size = self.config.batch_size.max(1);
        let mut sealed = Vec::new();

        loop {
            if self.is_paused() {
                if !self.buffer.lock().is_empty() {
                    debug!("[ql-04] Sealing paused while blocks are FailedPending");
                }
                break;
            }
            let records = {
                let mut buffer = self.buffer.lock();
                if buffer.is_empty() || (full_only && buffer.len() < batch_size) {
                    break;
                }
                buffer.take(batch_size)
            };

            let sequence = tip.next_sequence;
            self.states.lock().transition(sequence, BlockState::Sealing);
            let block = SealedBlock::seal(
                BlockHeader {
                    sequence,
                    previous_hash: tip.last_sealed_hash,
                    sealed_at: self.deps.time_source.now(),
                },
                records,
            );

            if let Err(e) = self.deps.store.put_pending(&block) {
                error!("[ql-04] Could not persist sealed block #{}: {}", sequence, e);
                self.states.lock().discard(sequence);
                self.buffer.lock().restore_front(block.records);
                return Err(e.into());
            }

            tip.next_sequence = sequence + 1;
            tip.last_sealed_hash = block.block_hash;
            info!(
                "[ql-04] Sealed block #{} with {} records ({})",
                sequence,
                block.records.len(),
                short_hex(&block.block_hash)
            );
            self.spawn_signing(block);
            sealed.push(sequence);
        }
        Ok(sealed)
    }

    fn spawn_signing(self: &Arc<Self>, block: SealedBlock) {
        let sequence = block.sequence();
        self.states.lock().transition(sequence, BlockState::Signing);
        self.signing.lock().insert(sequence);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.sign_with_retry(&block).await {
                Ok(seal) => this.enqueue_signed(block.into_signed(seal)).await,
                Err(failure) => this.park(block, failure).await,
            }
            this.signing.lock().remove(&sequence);
            this.progress.notify_waiters();
        });
    }

    // =========================================================================
    // Signing
    // =========================================================================

    /// One signing attempt on the blocking pool, bounded by `sign_timeout`.
    ///
    /// A timed-out attempt keeps its blocking thread and its signing slot
    /// until the backend returns, so a hung backend ties up at most
    /// `max_signing_threads` threads.
    async fn sign_once(
        &self,
        signer_id: IdentityId,
        message: Vec<u8>,
    ) -> std::result::Result<BlockSeal, SigningError> {
        let signer = Arc::clone(&self.deps.signer);
        let slots = Arc::clone(&self.signing_slots);
        let attempt = async move {
            let Ok(permit) = slots.acquire_owned().await else {
                return Err(SigningError::Unavailable("signing pool closed".into()));
            };
            let task = tokio::task::spawn_blocking(move || -> std::result::Result<_, SigningError> {
                let _permit = permit;
                let identity = signer.identity(&signer_id)?;
                let signature = signer.sign(&signer_id, &message)?;
                Ok(BlockSeal {
                    signer_id,
                    algorithm: identity.algorithm,
                    signature,
                })
            });
            match task.await {
                Ok(result) => result,
                Err(join) => Err(SigningError::Unavailable(format!(
                    "signing task failed: {}",
                    join
                ))),
            }
        };

        let timeout = self.config.signing.sign_timeout();
        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(SigningError::Unavailable(format!(
                "no signature within {:?}",
                timeout
            ))),
        }
    }

    /// Retry transient failures with exponential backoff. Anything else
    /// (revoked key, unknown identity or algorithm) gives up at once.
    pub(crate) async fn sign_with_retry(
        &self,
        block: &SealedBlock,
    ) -> std::result::Result<BlockSeal, SignFailure> {
        let retry = &self.config.signing;
        let max_attempts = retry.max_sign_attempts.max(1);
        let mut backoff = Backoff::new(retry.initial_backoff(), retry.max_backoff());
        let sequence = block.sequence();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.sign_once(self.current_signer(), block.signing_message()).await {
                Ok(seal) => {
                    if attempts > 1 {
                        info!("[ql-04] Block #{} signed after {} attempts", sequence, attempts);
                    }
                    return Ok(seal);
                }
                Err(error) if error.is_transient() && attempts < max_attempts => {
                    let delay = backoff.next_delay();
                    warn!(
                        "[ql-04] Signing block #{} failed (attempt {}/{}): {}; retrying in {:?}",
                        sequence, attempts, max_attempts, error, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(SignFailure { attempts, error }),
            }
        }
    }

    async fn park(&self, block: SealedBlock, failure: SignFailure) {
        let sequence = block.sequence();
        let signer_id = self.current_signer();
        let reason = failure.error.to_string();
        error!(
            "[ql-04] Block #{} is FailedPending after {} signing attempt(s) as {}: {}",
            sequence, failure.attempts, signer_id, reason
        );

        self.states.lock().transition(sequence, BlockState::FailedPending);
        self.parked.lock().insert(
            sequence,
            ParkedBlock {
                block,
                attempts: failure.attempts,
                reason: reason.clone(),
            },
        );
        self.deps
            .bus
            .publish(LedgerEvent::SigningUnavailable {
                sequence,
                signer_id,
                attempts: failure.attempts,
                reason,
            })
            .await;
    }

    /// Sign parked blocks again, oldest first. Stops at the first block that
    /// still fails; later ones could not commit before it anyway.
    pub(crate) async fn redrive(self: &Arc<Self>) -> Result<usize> {
        let _guard = self.redrive_lock.lock().await;
        let sequences: Vec<u64> = self.parked.lock().keys().copied().collect();
        let mut recovered = 0;

        for sequence in sequences {
            let Some((block, attempts)) = self
                .parked
                .lock()
                .get(&sequence)
                .map(|p| (p.block.clone(), p.attempts))
            else {
                continue;
            };
            info!(
                "[ql-04] Re-driving block #{} ({} earlier attempt(s))",
                sequence, attempts
            );
            self.states.lock().transition(sequence, BlockState::Signing);

            match self.sign_with_retry(&block).await {
                Ok(seal) => {
                    self.parked.lock().remove(&sequence);
                    self.deps
                        .bus
                        .publish(LedgerEvent::PendingRecovered { sequence })
                        .await;
                    self.enqueue_signed(block.into_signed(seal)).await;
                    recovered += 1;
                }
                Err(failure) => {
                    self.park(block, failure).await;
                    break;
                }
            }
        }
        self.progress.notify_waiters();

        match self.first_parked() {
            Some((sequence, reason)) => Err(LedgerError::SigningUnavailable { sequence, reason }),
            None => Ok(recovered),
        }
    }

    // =========================================================================
    // Commit
    // =========================================================================

    async fn enqueue_signed(&self, block: Block) {
        self.commit_queue.lock().insert(block);
        if let Err(e) = self.drain_commits().await {
            warn!("[ql-04] Commit deferred: {}", e);
        }
    }

    /// Commit whatever is next in line and publish the results.
    pub(crate) async fn drain_commits(&self) -> Result<usize> {
        let (events, result) = self.commit_ready();
        for event in events {
            self.deps.bus.publish(event).await;
        }
        result
    }

    /// Runs entirely under the queue lock so commits never interleave.
    fn commit_ready(&self) -> (Vec<LedgerEvent>, Result<usize>) {
        let mut queue = self.commit_queue.lock();
        let mut events = Vec::new();

        while let Some(block) = queue.peek_next() {
            let sequence = block.sequence();
            let head = match self.deps.store.commit_block(block) {
                Ok(head) => head,
                Err(e) => {
                    error!("[ql-04] Commit of block #{} failed: {}", sequence, e);
                    return (events, Err(e.into()));
                }
            };
            let Some(block) = queue.advance() else {
                break;
            };

            self.states.lock().transition(sequence, BlockState::Committed);
            self.head_tx.send_modify(|h| {
                h.length = head.length;
                h.last_hash = head.last_hash;
            });
            info!(
                "[ql-04] Committed block #{} ({} records, {})",
                sequence,
                block.records.len(),
                short_hex(&block.block_hash)
            );
            events.push(LedgerEvent::BlockCommitted {
                sequence,
                block_hash: block.block_hash,
                record_count: block.records.len(),
            });
        }

        let committed = events.len();
        (events, Ok(committed))
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Wait until no block below `target` has a signing task in flight.
    async fn wait_settled(&self, target: u64) {
        loop {
            let notified = self.progress.notified();
            if self.signing.lock().range(..target).next().is_none() {
                return;
            }
            notified.await;
        }
    }

    pub(crate) async fn flush(self: &Arc<Self>) -> Result<u64> {
        if self.is_paused() {
            if let Err(e) = self.redrive().await {
                debug!("[ql-04] Re-drive before flush incomplete: {}", e);
            }
        }
        self.drain_commits().await?;
        self.seal_ready(false).await?;

        let target = self.tip.lock().await.next_sequence;
        self.wait_settled(target).await;
        self.drain_commits().await?;

        let length = self.head_tx.borrow().length;
        if length < target {
            if let Some((sequence, reason)) = self.first_parked() {
                return Err(LedgerError::SigningUnavailable { sequence, reason });
            }
        }
        Ok(length)
    }

    /// Flush-interval tick: re-drive, retry deferred commits, seal partial batches.
    pub(crate) async fn tick(self: &Arc<Self>) {
        if self.is_paused() {
            if let Err(e) = self.redrive().await {
                debug!("[ql-04] Re-drive on tick incomplete: {}", e);
            }
        }
        if let Err(e) = self.drain_commits().await {
            warn!("[ql-04] Deferred commit still failing: {}", e);
        }
        if let Err(e) = self.seal_ready(false).await {
            warn!("[ql-04] Seal on flush tick failed: {}", e);
        }
    }
}
