//! # Node Lifecycle
//!
//! A file-backed node built through `node-runtime`: restarts, key
//! persistence and rotation, parked blocks across restarts, and readers
//! seeing the ledger close.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use futures::StreamExt;
    use node_runtime::{NodeConfig, NodeRuntime};
    use ql_01_signature_service::{IdentityProvisioning, SigningError};
    use ql_02_block_storage::StorageBackend;
    use ql_04_ledger_core::{LedgerApi, LedgerError};
    use ql_05_ingest_gateway::{IngestApi, SubmitOutcome};
    use ql_06_query_export::{QueryApi, RecordStream};
    use shared_types::{AlgorithmId, BlockState, IdentityId, Record, TimeSource};

    use crate::harness::{ledger_config, Harness};

    fn config(dir: &Path) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.storage.backend = StorageBackend::File;
        config.storage.data_dir = dir.to_path_buf();
        config.ledger = ledger_config(2);
        config.audit.interval_ms = 0;
        config
    }

    async fn submit(node: &NodeRuntime, id: &str) -> SubmitOutcome {
        node.container()
            .ingest
            .submit_event(Harness::event(id))
            .await
            .unwrap()
    }

    /// Revoke the node's current signer as of now.
    fn revoke_current(node: &NodeRuntime) -> IdentityId {
        let container = node.container();
        let id = container.ledger.signer();
        container
            .signer
            .revoke_identity(&id, container.time_source.now())
            .unwrap();
        id
    }

    async fn next_record(stream: &mut RecordStream) -> Option<Record> {
        tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("record stream stalled")
            .map(|item| item.expect("stream item"))
    }

    fn retired_keys(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("signer.key.retired-")
            })
            .count()
    }

    #[tokio::test]
    async fn test_restart_keeps_chain_identity_and_dedup() {
        let dir = tempfile::tempdir().unwrap();

        let signer = {
            let node = NodeRuntime::new(config(dir.path())).unwrap();
            for id in ["a", "b", "c"] {
                assert!(submit(&node, id).await.is_accepted());
            }
            node.container().ledger.flush().await.unwrap();
            let signer = node.container().ledger.signer();
            node.shutdown().await;
            signer
        };
        assert!(dir.path().join("signer.key").exists());

        let node = NodeRuntime::new(config(dir.path())).unwrap();
        let container = node.container();
        assert_eq!(container.ledger.head_sequence(), 2);
        assert_eq!(container.ledger.signer(), signer);
        assert_eq!(submit(&node, "a").await, SubmitOutcome::Duplicate);
        assert_eq!(container.query.get_record("c").unwrap().id(), "c");
        assert!(container.ledger.verify_chain(0, 1).await.unwrap().all_passed());
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_revoked_key_is_rotated_on_startup() {
        let dir = tempfile::tempdir().unwrap();

        let old = {
            let node = NodeRuntime::new(config(dir.path())).unwrap();
            submit(&node, "a").await;
            submit(&node, "b").await;
            node.container().ledger.flush().await.unwrap();
            let old = revoke_current(&node);
            node.shutdown().await;
            old
        };

        let node = NodeRuntime::new(config(dir.path())).unwrap();
        let container = node.container();
        let new = container.ledger.signer();
        assert_ne!(new, old);
        assert_eq!(retired_keys(dir.path()), 1);

        submit(&node, "c").await;
        submit(&node, "d").await;
        container.ledger.flush().await.unwrap();

        assert_eq!(container.query.get_block(0).unwrap().seal.signer_id, old);
        assert_eq!(container.query.get_block(1).unwrap().seal.signer_id, new);
        assert!(container.ledger.verify_chain(0, 1).await.unwrap().all_passed());
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_parked_block_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        {
            let node = NodeRuntime::new(config(dir.path())).unwrap();
            submit(&node, "a").await;
            submit(&node, "b").await;
            node.container().ledger.flush().await.unwrap();

            revoke_current(&node);
            submit(&node, "c").await;
            submit(&node, "d").await;
            assert!(matches!(
                node.container().ledger.flush().await,
                Err(LedgerError::SigningUnavailable { sequence: 1, .. })
            ));
            node.shutdown().await;
        }

        let node = NodeRuntime::new(config(dir.path())).unwrap();
        let container = node.container();
        assert_eq!(container.ledger.head_sequence(), 1);
        assert_eq!(container.ledger.block_state(1), Some(BlockState::FailedPending));
        // Records of a parked block are already taken.
        assert_eq!(submit(&node, "c").await, SubmitOutcome::Duplicate);

        assert_eq!(container.ledger.redrive_pending().await.unwrap(), 1);
        assert_eq!(container.ledger.head_sequence(), 2);
        let block = container.query.get_block(1).unwrap();
        assert_eq!(block.seal.signer_id, container.ledger.signer());
        assert!(container.ledger.verify_chain(0, 1).await.unwrap().all_passed());
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_rotation_recovers_parked_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeRuntime::new(config(dir.path())).unwrap();
        let container = node.container();

        let old = revoke_current(&node);
        submit(&node, "a").await;
        submit(&node, "b").await;
        assert!(container.ledger.flush().await.is_err());
        assert_eq!(container.ledger.block_state(0), Some(BlockState::FailedPending));

        let new = node.rotate_signer(AlgorithmId::Dilithium3).await.unwrap();
        assert_ne!(new, old);
        assert_eq!(container.ledger.block_state(0), Some(BlockState::Committed));

        let block = container.query.get_block(0).unwrap();
        assert_eq!(block.seal.signer_id, new);
        assert_eq!(block.seal.algorithm, AlgorithmId::Dilithium3);
        assert_eq!(retired_keys(dir.path()), 1);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_rotation_refuses_verification_only_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeRuntime::new(config(dir.path())).unwrap();
        let container = node.container();
        let before = container.ledger.signer();

        let err = node.rotate_signer(AlgorithmId::Ed25519).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<SigningError>(),
            Some(&SigningError::VerificationOnly(AlgorithmId::Ed25519))
        );
        assert_eq!(container.ledger.signer(), before);
        assert_eq!(retired_keys(dir.path()), 0);

        submit(&node, "a").await;
        container.ledger.flush().await.unwrap();
        let block = container.query.get_block(0).unwrap();
        assert_eq!(block.seal.signer_id, before);
        assert!(block.seal.algorithm.is_post_quantum());
        node.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_record_stream_ends_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let node = NodeRuntime::new(config(dir.path())).unwrap();
        node.start();
        let mut stream = node.container().query.stream_records(0);

        submit(&node, "a").await;
        submit(&node, "b").await;

        assert_eq!(next_record(&mut stream).await.unwrap().id(), "a");
        assert_eq!(next_record(&mut stream).await.unwrap().id(), "b");

        submit(&node, "c").await;
        node.shutdown().await;

        // The final flush commits "c" before readers see the close.
        assert_eq!(next_record(&mut stream).await.unwrap().id(), "c");
        assert!(next_record(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_node_uses_an_ephemeral_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.storage.backend = StorageBackend::Memory;

        let node = NodeRuntime::new(config).unwrap();
        submit(&node, "a").await;
        node.container().ledger.flush().await.unwrap();
        assert_eq!(node.container().ledger.head_sequence(), 1);
        assert!(!dir.path().join("signer.key").exists());
        node.shutdown().await;
    }
}
