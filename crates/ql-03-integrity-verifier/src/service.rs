//! # Integrity Verifier Service
//!
//! Chunked scans over the committed chain. Content and signature checks of a
//! chunk run on the rayon pool; linkage is then walked in sequence order.

use crate::config::AuditConfig;
use crate::domain::cancel::AuditCancel;
use crate::domain::checks::{check_block, check_content, BlockCheck};
use crate::domain::report::{
    AuditReport, AuditScope, BlockVerdict, ChainReport, Divergence, DivergenceReason, RangeOutcome,
};
use crate::error::VerifierError;
use crate::ports::inbound::IntegrityVerifierApi;
use parking_lot::Mutex;
use ql_01_signature_service::SigningApi;
use ql_02_block_storage::{BlockStorageApi, StorageError};
use rayon::prelude::*;
use shared_bus::{EventPublisher, LedgerEvent};
use shared_types::hashing::short_hex;
use shared_types::{hash_eq, Checkpoint, Hash, TimeSource, GENESIS_HASH};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Result of walking a range until it ends, diverges or is cancelled.
#[derive(Debug, Default)]
struct Scan {
    verified: u64,
    last: Option<(u64, Hash)>,
    divergence: Option<Divergence>,
    cancelled: bool,
}

/// Where a pass starts and what it links to.
struct Start {
    from: u64,
    anchor: Option<Hash>,
    checkpoint: Option<Checkpoint>,
}

pub struct IntegrityVerifier {
    store: Arc<dyn BlockStorageApi>,
    signer: Arc<dyn SigningApi>,
    bus: Option<Arc<dyn EventPublisher>>,
    time_source: Arc<dyn TimeSource>,
    config: AuditConfig,
    /// One audit at a time touches the checkpoint.
    audit_lock: Mutex<()>,
}

impl IntegrityVerifier {
    pub fn new(
        store: Arc<dyn BlockStorageApi>,
        signer: Arc<dyn SigningApi>,
        time_source: Arc<dyn TimeSource>,
        config: AuditConfig,
    ) -> Self {
        Self {
            store,
            signer,
            bus: None,
            time_source,
            config,
            audit_lock: Mutex::new(()),
        }
    }

    /// Publish divergences and checkpoint moves from `request_audit`.
    pub fn with_bus(mut self, bus: Arc<dyn EventPublisher>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run an audit on a blocking worker and publish the outcome.
    pub async fn request_audit(
        self: &Arc<Self>,
        scope: AuditScope,
        cancel: AuditCancel,
    ) -> Result<AuditReport, VerifierError> {
        let this = Arc::clone(self);
        let report = tokio::task::spawn_blocking(move || this.audit(scope, &cancel))
            .await
            .map_err(|e| VerifierError::TaskFailed(e.to_string()))??;

        if let Some(bus) = &self.bus {
            match &report {
                AuditReport::Divergence(d) => {
                    bus.publish(LedgerEvent::ChainIntegrityViolation {
                        sequence: d.sequence,
                        reason: d.reason.to_string(),
                    })
                    .await;
                }
                AuditReport::Verified {
                    checkpoint: Some(cp),
                    ..
                } => {
                    bus.publish(LedgerEvent::CheckpointAdvanced {
                        sequence: cp.sequence,
                        block_hash: cp.block_hash,
                    })
                    .await;
                }
                _ => {}
            }
        }
        Ok(report)
    }

    /// Incremental audits every `interval_ms` until `shutdown` flips.
    pub async fn run_periodic(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let Some(period) = self.config.interval() else {
            debug!("[ql-03] Periodic audit disabled");
            return;
        };
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let cancel = AuditCancel::new();
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            let audit = self.request_audit(AuditScope::Incremental, cancel.clone());
            tokio::pin!(audit);
            let result = tokio::select! {
                result = &mut audit => result,
                _ = shutdown.changed() => {
                    cancel.cancel();
                    audit.await
                }
            };
            if let Err(e) = result {
                warn!("[ql-03] Periodic audit failed to run: {}", e);
            }
            if *shutdown.borrow() {
                break;
            }
        }
        debug!("[ql-03] Periodic audit stopped");
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Load and check one block. Missing or corrupt blocks become verdicts.
    fn check_at(&self, sequence: u64) -> Result<BlockCheck, VerifierError> {
        match self.store.read_block(sequence) {
            Ok(block) => Ok(check_block(sequence, &block, self.signer.as_ref())?),
            Err(e) => storage_verdict(sequence, e).map(|r| BlockCheck::unreadable(sequence, r)),
        }
    }

    fn check_chunk(&self, from: u64, to: u64) -> Result<Vec<BlockCheck>, VerifierError> {
        (from..=to)
            .into_par_iter()
            .map(|sequence| self.check_at(sequence))
            .collect()
    }

    /// Hash that block `from` must link to. `None` if its predecessor is gone.
    fn anchor_for(&self, from: u64) -> Result<Option<Hash>, VerifierError> {
        if from == 0 {
            return Ok(Some(GENESIS_HASH));
        }
        match self.store.read_stored(from - 1) {
            Ok(stored) => Ok(Some(stored.block.block_hash)),
            Err(e) => storage_verdict(from - 1, e).map(|_| None),
        }
    }

    /// Clip `[from, to]` at the head. `None` when nothing is committed there.
    fn clip(&self, from: u64, to: u64) -> Result<Option<u64>, VerifierError> {
        if from > to {
            return Err(VerifierError::InvalidRange { from, to });
        }
        let head = self.store.head()?;
        Ok(head
            .last_sequence()
            .filter(|last| *last >= from)
            .map(|last| last.min(to)))
    }

    fn chunks(&self, from: u64, to: u64) -> impl Iterator<Item = (u64, u64)> {
        let size = self.config.chunk_size.max(1) as u64;
        (from..=to)
            .step_by(size as usize)
            .map(move |start| (start, start.saturating_add(size - 1).min(to)))
    }

    fn scan(
        &self,
        from: u64,
        to: u64,
        mut anchor: Option<Hash>,
        cancel: Option<&AuditCancel>,
    ) -> Result<Scan, VerifierError> {
        let mut scan = Scan::default();
        for (start, end) in self.chunks(from, to) {
            if cancel.is_some_and(AuditCancel::is_cancelled) {
                scan.cancelled = true;
                return Ok(scan);
            }
            debug!("[ql-03] Verifying blocks {}..={}", start, end);

            for check in self.check_chunk(start, end)? {
                if let Some(reason) = check.verdict(anchor.as_ref()) {
                    scan.divergence = Some(Divergence {
                        sequence: check.sequence,
                        reason,
                    });
                    return Ok(scan);
                }
                if let Some(hash) = check.block_hash {
                    anchor = Some(hash);
                    scan.last = Some((check.sequence, hash));
                }
                scan.verified += 1;
            }
        }
        Ok(scan)
    }

    // =========================================================================
    // Audits
    // =========================================================================

    /// Resolve the starting point of a checkpointing audit.
    ///
    /// An incremental start re-checks the checkpointed block first.
    fn checkpoint_start(
        &self,
        scope: AuditScope,
    ) -> Result<Result<Start, Divergence>, VerifierError> {
        let checkpoint = self.store.load_checkpoint()?;
        let Some(cp) = checkpoint.filter(|_| scope == AuditScope::Incremental) else {
            return Ok(Ok(Start {
                from: 0,
                anchor: Some(GENESIS_HASH),
                checkpoint,
            }));
        };

        let reason = match self.store.read_block(cp.sequence) {
            Ok(block) if !hash_eq(&block.block_hash, &cp.block_hash) => {
                Some(DivergenceReason::CheckpointMismatch)
            }
            Ok(block) => check_content(cp.sequence, &block),
            Err(e) => Some(storage_verdict(cp.sequence, e)?),
        };
        if let Some(reason) = reason {
            return Ok(Err(Divergence {
                sequence: cp.sequence,
                reason,
            }));
        }

        Ok(Ok(Start {
            from: cp.sequence + 1,
            anchor: Some(cp.block_hash),
            checkpoint: Some(cp),
        }))
    }

    fn advance_checkpoint(
        &self,
        last: Option<(u64, Hash)>,
        current: Option<&Checkpoint>,
    ) -> Result<Option<Checkpoint>, VerifierError> {
        let Some((sequence, block_hash)) = last else {
            return Ok(None);
        };
        if current.is_some_and(|cp| cp.sequence >= sequence) {
            return Ok(None);
        }
        let checkpoint = Checkpoint {
            sequence,
            block_hash,
            recorded_at: self.time_source.now(),
        };
        self.store.save_checkpoint(&checkpoint)?;
        Ok(Some(checkpoint))
    }

    fn report_divergence(&self, divergence: Divergence) -> AuditReport {
        error!(
            "[ql-03] Chain integrity violation at block #{}: {}",
            divergence.sequence, divergence.reason
        );
        AuditReport::Divergence(divergence)
    }
}

impl IntegrityVerifierApi for IntegrityVerifier {
    fn verify_range(&self, from: u64, to: u64) -> Result<RangeOutcome, VerifierError> {
        let Some(to) = self.clip(from, to)? else {
            return Ok(RangeOutcome::Intact {
                verified: 0,
                last: None,
            });
        };
        let scan = self.scan(from, to, self.anchor_for(from)?, None)?;
        Ok(match scan.divergence {
            Some(d) => RangeOutcome::Diverged(d),
            None => RangeOutcome::Intact {
                verified: scan.verified,
                last: scan.last,
            },
        })
    }

    fn verify_chain(&self, from: u64, to: u64) -> Result<ChainReport, VerifierError> {
        let Some(to) = self.clip(from, to)? else {
            return Ok(ChainReport::default());
        };
        let mut anchor = self.anchor_for(from)?;
        let mut report = ChainReport::default();

        for (start, end) in self.chunks(from, to) {
            for check in self.check_chunk(start, end)? {
                report.verdicts.push(BlockVerdict {
                    sequence: check.sequence,
                    failure: check.verdict(anchor.as_ref()),
                });
                // Link the next block to what is stored, even if this one failed.
                anchor = check.block_hash;
            }
        }
        Ok(report)
    }

    fn audit(&self, scope: AuditScope, cancel: &AuditCancel) -> Result<AuditReport, VerifierError> {
        let _guard = self.audit_lock.lock();

        let (start, through, moves_checkpoint) = match scope {
            AuditScope::Range { from, to } => {
                let start = Start {
                    from,
                    anchor: self.anchor_for(from)?,
                    checkpoint: None,
                };
                (start, self.clip(from, to)?, false)
            }
            AuditScope::Full | AuditScope::Incremental => match self.checkpoint_start(scope)? {
                Ok(start) => {
                    let through = self.store.head()?.last_sequence().filter(|l| *l >= start.from);
                    (start, through, true)
                }
                Err(divergence) => return Ok(self.report_divergence(divergence)),
            },
        };

        let Some(through) = through else {
            debug!("[ql-03] Nothing to audit from block #{}", start.from);
            return Ok(AuditReport::Verified {
                from: start.from,
                through: None,
                verified: 0,
                checkpoint: None,
            });
        };

        info!(
            "[ql-03] Auditing blocks {}..={} ({:?})",
            start.from, through, scope
        );
        let scan = self.scan(start.from, through, start.anchor, Some(cancel))?;

        if let Some(divergence) = scan.divergence {
            return Ok(self.report_divergence(divergence));
        }

        if scan.cancelled {
            let saved = if moves_checkpoint {
                self.advance_checkpoint(scan.last, start.checkpoint.as_ref())?
            } else {
                None
            };
            let resume_from = scan.last.map_or(start.from, |(seq, _)| seq + 1);
            info!(
                "[ql-03] Audit cancelled after {} blocks, resume from #{}{}",
                scan.verified,
                resume_from,
                if saved.is_some() { " (checkpoint saved)" } else { "" }
            );
            return Ok(AuditReport::Cancelled { resume_from });
        }

        let checkpoint = if moves_checkpoint {
            self.advance_checkpoint(scan.last, start.checkpoint.as_ref())?
        } else {
            None
        };
        if let Some(cp) = &checkpoint {
            info!(
                "[ql-03] Checkpoint advanced to #{} ({})",
                cp.sequence,
                short_hex(&cp.block_hash)
            );
        }
        Ok(AuditReport::Verified {
            from: start.from,
            through: Some(through),
            verified: scan.verified,
            checkpoint,
        })
    }
}

/// Storage failures that describe the block are verdicts; the rest abort the pass.
fn storage_verdict(sequence: u64, err: StorageError) -> Result<DivergenceReason, VerifierError> {
    match err {
        StorageError::BlockNotFound { .. } => Ok(DivergenceReason::MissingBlock),
        e @ (StorageError::DataCorruption { .. } | StorageError::SerializationError { .. }) => {
            warn!("[ql-03] Block #{} unreadable: {}", sequence, e);
            Ok(DivergenceReason::StorageCorruption(e.to_string()))
        }
        e => Err(e.into()),
    }
}
