//! # Ingest Gateway Service

use crate::config::IngestConfig;
use crate::domain::dedup::{Claim, DedupIndex};
use crate::domain::event::{IngestEvent, SubmitOutcome};
use crate::domain::validation::{decode, validate};
use crate::error::IngestError;
use crate::ports::IngestApi;
use async_trait::async_trait;
use ql_02_block_storage::BlockStorageApi;
use ql_04_ledger_core::{LedgerApi, LedgerError};
use shared_bus::{EventPublisher, LedgerEvent};
use shared_types::TimeSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Submission counters since start.
#[derive(Debug, Default)]
pub struct IngestStats {
    pub accepted: AtomicU64,
    pub duplicates: AtomicU64,
    pub rejected: AtomicU64,
    pub capacity_refusals: AtomicU64,
}

pub struct IngestGateway {
    ledger: Arc<dyn LedgerApi>,
    bus: Arc<dyn EventPublisher>,
    time_source: Arc<dyn TimeSource>,
    config: IngestConfig,
    dedup: DedupIndex,
    stats: IngestStats,
}

impl IngestGateway {
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        bus: Arc<dyn EventPublisher>,
        time_source: Arc<dyn TimeSource>,
        config: IngestConfig,
    ) -> Self {
        Self {
            ledger,
            bus,
            time_source,
            config,
            dedup: DedupIndex::new(),
            stats: IngestStats::default(),
        }
    }

    /// Seed the dedup index from committed and pending records so resubmits
    /// after a restart are still recognised.
    pub fn rebuild_index(&self, store: &dyn BlockStorageApi) -> Result<usize, IngestError> {
        let committed = self.dedup.extend_accepted(store.committed_record_ids()?);
        let pending = self.dedup.extend_accepted(
            store
                .pending_blocks()?
                .into_iter()
                .flat_map(|block| block.records.into_iter().map(|r| r.id().to_string())),
        );
        info!(
            committed,
            pending, "[ql-05] Dedup index rebuilt with {} ids", committed + pending
        );
        Ok(committed + pending)
    }

    pub fn dedup(&self) -> &DedupIndex {
        &self.dedup
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    fn reject(
        &self,
        event_id: &str,
        reason: crate::domain::validation::Rejection,
    ) -> SubmitOutcome {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(event_id, %reason, "[ql-05] Event rejected");
        SubmitOutcome::Rejected(reason)
    }
}

#[async_trait]
impl IngestApi for IngestGateway {
    async fn submit_event(&self, event: IngestEvent) -> Result<SubmitOutcome, IngestError> {
        let event_id = event.event_id.clone();
        let record = match validate(event, &self.config, self.time_source.now()) {
            Ok(record) => record,
            Err(reason) => return Ok(self.reject(&event_id, reason)),
        };

        let reservation = loop {
            match self.dedup.reserve(record.id()) {
                Claim::Reserved(reservation) => break reservation,
                Claim::Duplicate => {
                    self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                    debug!(event_id, "[ql-05] Duplicate event");
                    return Ok(SubmitOutcome::Duplicate);
                }
                Claim::InFlight(settled) => {
                    debug!(event_id, "[ql-05] Same event in flight, waiting for it to settle");
                    settled.wait().await;
                }
            }
        };

        match self.ledger.append(vec![record]).await {
            Ok(_) => {
                reservation.keep();
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(SubmitOutcome::Accepted(event_id))
            }
            Err(LedgerError::CapacityExceeded {
                buffered, limit, ..
            }) => {
                drop(reservation);
                self.stats.capacity_refusals.fetch_add(1, Ordering::Relaxed);
                warn!(event_id, buffered, limit, "[ql-05] Ledger at capacity");
                self.bus
                    .publish(LedgerEvent::CapacityExhausted { buffered, limit })
                    .await;
                Err(IngestError::CapacityExceeded { buffered, limit })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn submit_json(&self, bytes: &[u8]) -> Result<SubmitOutcome, IngestError> {
        match decode(bytes) {
            Ok(event) => self.submit_event(event).await,
            Err(reason) => Ok(self.reject("<undecodable>", reason)),
        }
    }
}
