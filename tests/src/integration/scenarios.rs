//! # End-to-End Scenarios
//!
//! Producer → Ingest Gateway (ql-05) → Ledger Core (ql-04) → Signature
//! Service (ql-01) / Block Storage (ql-02) → Query (ql-06) / Verifier (ql-03).

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::harness::{ledger_config, Harness, NOW};
    use ql_01_signature_service::{IdentityProvisioning, SigningApi, SigningError};
    use ql_04_ledger_core::{LedgerApi, LedgerError};
    use ql_05_ingest_gateway::{IngestApi, SubmitOutcome};
    use ql_06_query_export::QueryApi;
    use shared_bus::{EventFilter, EventSubscriber, LedgerEvent, Subscription};
    use shared_types::{BlockState, TimeSource, GENESIS_HASH};

    fn drain(subscription: &mut Subscription) -> Vec<LedgerEvent> {
        std::iter::from_fn(|| subscription.try_recv().ok().flatten()).collect()
    }

    fn ids(block: &shared_types::Block) -> Vec<&str> {
        block.records.iter().map(|r| r.id()).collect()
    }

    /// Batch size 3, flush interval 10s: E1..E5 submitted at once give a full
    /// block right away and a partial one at the next flush.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_of_three_then_flush() {
        let h = Harness::new(ledger_config(3));
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let runner = {
            let ledger = h.ledger.clone();
            tokio::spawn(async move { ledger.run(shutdown_rx).await })
        };

        for id in ["E1", "E2", "E3", "E4", "E5"] {
            assert_eq!(h.submit(id).await, SubmitOutcome::Accepted(id.to_string()));
        }

        let mut head = h.ledger.subscribe_head();
        tokio::time::timeout(Duration::from_secs(10), head.wait_for(|head| head.length >= 1))
            .await
            .expect("threshold seal")
            .expect("ledger alive");
        assert_eq!(h.ledger.head_sequence(), 1);
        assert_eq!(h.ledger.buffered_len(), 2);

        // Stands in for the flush timer firing.
        assert_eq!(h.ledger.flush().await.unwrap(), 2);

        let block0 = h.query.get_block(0).unwrap();
        let block1 = h.query.get_block(1).unwrap();
        assert_eq!(ids(&block0), ["E1", "E2", "E3"]);
        assert_eq!(ids(&block1), ["E4", "E5"]);
        assert_eq!(block0.header.sequence, 0);
        assert_eq!(block0.previous_hash(), GENESIS_HASH);
        assert_eq!(block1.header.sequence, 1);
        assert_eq!(block1.previous_hash(), block0.block_hash);
        assert!(h.ledger.verify_chain(0, 1).await.unwrap().all_passed());

        shutdown_tx.send(true).unwrap();
        runner.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hundred_concurrent_submissions() {
        let h = Arc::new(Harness::new(ledger_config(16)));

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let h = h.clone();
                tokio::spawn(async move { h.submit(&format!("evt-{i:03}")).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_accepted());
        }

        h.ledger.flush().await.unwrap();

        let committed = h.committed_ids();
        assert_eq!(committed.len(), 100);
        let unique: HashSet<_> = committed.iter().cloned().collect();
        let expected: HashSet<_> = (0..100).map(|i| format!("evt-{i:03}")).collect();
        assert_eq!(unique, expected);
        assert!(h.committed_blocks().len() >= 100 / 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_commit_once() {
        let h = Arc::new(Harness::new(ledger_config(8)));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move { h.submit("same-id").await })
            })
            .collect();
        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                SubmitOutcome::Accepted(_) => accepted += 1,
                SubmitOutcome::Duplicate => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(accepted, 1);

        h.ledger.flush().await.unwrap();
        assert_eq!(h.submit("same-id").await, SubmitOutcome::Duplicate);
        assert_eq!(h.committed_ids(), vec!["same-id".to_string()]);
        assert_eq!(h.query.get_record("same-id").unwrap().id(), "same-id");
    }

    /// Identity X signs Block5, then is revoked: Block5 still verifies, new
    /// signing fails with `KeyRevoked`.
    #[tokio::test]
    async fn test_revocation_after_block_five() {
        let h = Harness::new(ledger_config(1));
        for i in 0..6 {
            h.submit(&format!("r{i}")).await;
            h.time.advance(10);
        }
        h.ledger.flush().await.unwrap();
        let block5 = h.query.get_block(5).unwrap();
        assert_eq!(block5.seal.signer_id, h.identity);

        h.time.advance(1_000);
        h.service.revoke_identity(&h.identity, h.time.now()).unwrap();

        assert!(h
            .service
            .verify(&h.identity, &block5.signing_message(), &block5.seal.signature)
            .unwrap());
        assert!(matches!(
            h.service.sign(&h.identity, b"next block"),
            Err(SigningError::KeyRevoked { .. })
        ));
        assert!(h.ledger.verify_chain(0, 5).await.unwrap().all_passed());

        // The ledger parks the next block rather than dropping it.
        h.submit("after-revocation").await;
        assert!(matches!(
            h.ledger.flush().await,
            Err(LedgerError::SigningUnavailable { sequence: 6, .. })
        ));
        assert_eq!(h.ledger.block_state(6), Some(BlockState::FailedPending));
    }

    /// Three failed signing cycles, then recovery: the block goes
    /// Signing → FailedPending → Signing → Committed and nothing is lost or
    /// committed twice.
    #[tokio::test]
    async fn test_signing_outage_then_recovery() {
        let h = Harness::new(ledger_config(2));
        let mut events = h.bus.subscribe(EventFilter::all());
        h.signer.set_outage(true);

        h.submit("a").await;
        h.submit("b").await;

        // Cycle 1: sealing plus the bounded retry budget.
        assert!(matches!(
            h.ledger.flush().await,
            Err(LedgerError::SigningUnavailable { sequence: 0, .. })
        ));
        assert_eq!(h.ledger.block_state(0), Some(BlockState::FailedPending));

        // Records keep buffering while the block is parked.
        h.submit("c").await;

        // Cycles 2 and 3: re-drives that fail again.
        for _ in 0..2 {
            assert!(h.ledger.redrive_pending().await.is_err());
            assert_eq!(h.ledger.block_state(0), Some(BlockState::FailedPending));
        }
        assert_eq!(h.ledger.head_sequence(), 0);
        assert_eq!(h.signer.sign_calls(), 6);

        h.signer.set_outage(false);
        assert_eq!(h.ledger.redrive_pending().await.unwrap(), 1);
        assert_eq!(h.ledger.block_state(0), Some(BlockState::Committed));
        h.ledger.flush().await.unwrap();

        assert_eq!(h.committed_ids(), ["a", "b", "c"]);
        assert!(h.ledger.verify_chain(0, 1).await.unwrap().all_passed());

        let seen = drain(&mut events);
        let unavailable = seen
            .iter()
            .filter(|e| matches!(e, LedgerEvent::SigningUnavailable { sequence: 0, .. }))
            .count();
        let commits: Vec<u64> = seen
            .iter()
            .filter_map(|e| match e {
                LedgerEvent::BlockCommitted { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect();
        assert!(unavailable >= 1);
        assert!(seen.contains(&LedgerEvent::PendingRecovered { sequence: 0 }));
        assert_eq!(commits, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_capacity_backpressure_then_retry() {
        let mut config = ledger_config(100);
        config.max_buffered_records = 3;
        let h = Harness::new(config);
        let mut alerts = h.bus.subscribe(EventFilter::alerts());

        for id in ["a", "b", "c"] {
            assert!(h.submit(id).await.is_accepted());
        }
        let err = h.ingest.submit_event(Harness::event("d")).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(
            alerts.recv().await,
            Some(LedgerEvent::CapacityExhausted { buffered: 3, limit: 3 })
        );

        h.ledger.flush().await.unwrap();
        assert!(h.submit("d").await.is_accepted());
        h.ledger.flush().await.unwrap();
        assert_eq!(h.committed_ids(), ["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_rejected_events_never_reach_the_ledger() {
        let h = Harness::new(ledger_config(4));
        let mut future = Harness::event("late");
        future.timestamp = NOW + 24 * 60 * 60 * 1_000;
        assert!(matches!(
            h.ingest.submit_event(future).await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));
        assert!(matches!(
            h.ingest.submit_json(b"{\"event_id\": 1}").await.unwrap(),
            SubmitOutcome::Rejected(_)
        ));
        assert_eq!(h.ledger.buffered_len(), 0);
    }
}
