//! # Chain Properties
//!
//! Structural guarantees of whatever the ledger commits: gapless sequences,
//! hash linkage back to genesis, signatures that verify under the recorded
//! signer, and tamper evidence at the exact block and record.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;

    use crate::harness::{ledger_config, Harness};
    use proptest::prelude::*;
    use ql_01_signature_service::SigningApi;
    use ql_02_block_storage::BlockStorageApi;
    use ql_03_integrity_verifier::{
        AuditCancel, AuditReport, AuditScope, Divergence, DivergenceReason,
        IntegrityVerifierApi, RangeOutcome,
    };
    use ql_04_ledger_core::LedgerApi;
    use ql_05_ingest_gateway::SubmitOutcome;
    use shared_bus::{EventFilter, EventSubscriber, LedgerEvent};
    use shared_types::{Block, GENESIS_HASH};

    async fn filled(batch: usize, count: usize) -> Harness {
        let h = Harness::new(ledger_config(batch));
        for i in 0..count {
            assert!(h.submit(&format!("rec-{i}")).await.is_accepted());
        }
        h.ledger.flush().await.unwrap();
        h
    }

    /// Everything a reader needs to trust `blocks` without the writer.
    fn assert_chain_shape(h: &Harness, blocks: &[Block], batch: usize) {
        let mut previous = GENESIS_HASH;
        for (index, block) in blocks.iter().enumerate() {
            assert_eq!(block.sequence(), index as u64);
            assert_eq!(block.previous_hash(), previous);
            assert_eq!(block.recompute_hash(), block.block_hash);
            assert!(!block.records.is_empty() && block.records.len() <= batch);
            assert!(h
                .signer
                .verify_with(
                    &block.seal.signer_id,
                    block.seal.algorithm,
                    &block.signing_message(),
                    &block.seal.signature,
                )
                .unwrap());
            previous = block.block_hash;
        }
    }

    #[tokio::test]
    async fn test_committed_chain_links_to_genesis() {
        let h = filled(3, 10).await;
        let blocks = h.committed_blocks();
        assert_eq!(blocks.len(), 4);
        assert_chain_shape(&h, &blocks, 3);
        assert_eq!(h.ledger.head_sequence(), 4);
    }

    #[tokio::test]
    async fn test_resubmission_is_idempotent() {
        let h = filled(4, 6).await;
        let before = h.committed_blocks();

        for i in 0..6 {
            assert_eq!(h.submit(&format!("rec-{i}")).await, SubmitOutcome::Duplicate);
        }
        h.ledger.flush().await.unwrap();

        assert_eq!(h.committed_blocks(), before);
        assert_eq!(h.ingest.stats().duplicates.load(Ordering::Relaxed), 6);
    }

    #[tokio::test]
    async fn test_tampered_record_is_located() {
        let h = filled(2, 8).await;
        h.tamper_payload(2, 1);

        let outcome = h.verifier.verify_range(0, 3).unwrap();
        assert_eq!(
            outcome,
            RangeOutcome::Diverged(Divergence {
                sequence: 2,
                reason: DivergenceReason::RecordHashMismatch { index: 1 },
            })
        );

        // Blocks around it still pass on their own.
        let report = h.ledger.verify_chain(0, 3).await.unwrap();
        let failed: Vec<u64> = report.failures().map(|v| v.sequence).collect();
        assert_eq!(failed, vec![2]);
        assert!(h.verifier.verify_range(0, 1).unwrap().is_intact());
    }

    #[tokio::test]
    async fn test_incremental_audit_covers_only_new_blocks() {
        let h = filled(1, 4).await;

        let first = h
            .verifier
            .audit(AuditScope::Incremental, &AuditCancel::new())
            .unwrap();
        match first {
            AuditReport::Verified {
                from: 0,
                through: Some(3),
                verified: 4,
                checkpoint: Some(cp),
            } => assert_eq!(cp.sequence, 3),
            other => panic!("unexpected report {other:?}"),
        }

        for id in ["late-1", "late-2"] {
            h.submit(id).await;
        }
        h.ledger.flush().await.unwrap();

        match h
            .verifier
            .audit(AuditScope::Incremental, &AuditCancel::new())
            .unwrap()
        {
            AuditReport::Verified {
                from,
                through,
                verified,
                checkpoint,
            } => {
                assert_eq!((from, through, verified), (4, Some(5), 2));
                assert_eq!(checkpoint.map(|cp| cp.sequence), Some(5));
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_audit_resumes_from_checkpoint() {
        let h = filled(1, 4).await;
        assert!(h
            .verifier
            .audit(AuditScope::Incremental, &AuditCancel::new())
            .unwrap()
            .is_verified());

        for id in ["late-1", "late-2"] {
            h.submit(id).await;
        }
        h.ledger.flush().await.unwrap();

        let cancel = AuditCancel::new();
        cancel.cancel();
        assert_eq!(
            h.verifier.audit(AuditScope::Incremental, &cancel).unwrap(),
            AuditReport::Cancelled { resume_from: 4 }
        );
        assert_eq!(h.store.load_checkpoint().unwrap().map(|cp| cp.sequence), Some(3));

        match h
            .verifier
            .audit(AuditScope::Incremental, &AuditCancel::new())
            .unwrap()
        {
            AuditReport::Verified { from, verified, .. } => assert_eq!((from, verified), (4, 2)),
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_audit_request_raises_integrity_alert() {
        let h = filled(2, 6).await;
        let mut alerts = h.bus.subscribe(EventFilter::alerts());
        h.tamper_payload(1, 0);

        let report = h
            .verifier
            .request_audit(AuditScope::Full, AuditCancel::new())
            .await
            .unwrap();
        assert!(!report.is_verified());

        match alerts.recv().await {
            Some(LedgerEvent::ChainIntegrityViolation { sequence, reason }) => {
                assert_eq!(sequence, 1);
                assert!(reason.contains("record 0"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_any_batching_yields_a_valid_chain(batch in 1usize..8, count in 1usize..30) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let h = filled(batch, count).await;
                let blocks = h.committed_blocks();

                prop_assert_eq!(blocks.len(), count.div_ceil(batch));
                assert_chain_shape(&h, &blocks, batch);

                let ids = h.committed_ids();
                let unique: HashSet<_> = ids.iter().collect();
                prop_assert_eq!(ids.len(), count);
                prop_assert_eq!(unique.len(), count);
                let report = h.ledger.verify_chain(0, blocks.len() as u64 - 1).await.unwrap();
                prop_assert!(report.all_passed());
                Ok(())
            })?;
        }
    }
}
