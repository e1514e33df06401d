//! # Test Harness
//!
//! Wires every subsystem in-process the way the node does, except that the
//! signing service sits behind a switch so tests can take it offline.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use ql_01_signature_service::{
    AlgorithmRegistry, IdentityProvisioning, InMemoryIdentityRepository, SignatureService,
    SigningApi, SigningError,
};
use ql_02_block_storage::{
    BincodeBlockSerializer, BlockSerializer, BlockStorageApi, BlockStore, ChecksumProvider,
    DefaultChecksumProvider, InMemoryKVStore, KeyPrefix, KeyValueStore, StoredBlock,
};
use ql_03_integrity_verifier::{AuditConfig, IntegrityVerifier};
use ql_04_ledger_core::{LedgerConfig, LedgerCore, LedgerDependencies, SigningRetryConfig};
use ql_05_ingest_gateway::{IngestApi, IngestConfig, IngestEvent, IngestGateway, SubmitOutcome};
use ql_06_query_export::QueryService;
use shared_bus::InMemoryEventBus;
use shared_types::{
    AlgorithmId, Block, Identity, IdentityId, ManualTimeSource, TimeSource, Timestamp,
};

pub const NOW: Timestamp = 1_700_000_000_000;

pub type Service = SignatureService<InMemoryIdentityRepository>;

/// Real signing service with an outage switch.
pub struct SwitchableSigner {
    pub inner: Arc<Service>,
    outage: AtomicBool,
    sign_calls: AtomicU32,
}

impl SwitchableSigner {
    pub fn set_outage(&self, on: bool) {
        self.outage.store(on, Ordering::SeqCst);
    }

    pub fn sign_calls(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

impl SigningApi for SwitchableSigner {
    fn sign(&self, identity: &IdentityId, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.outage.load(Ordering::SeqCst) {
            return Err(SigningError::Unavailable("signing backend offline".into()));
        }
        self.inner.sign(identity, message)
    }

    fn verify(
        &self,
        identity: &IdentityId,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SigningError> {
        self.inner.verify(identity, message, signature)
    }

    fn verify_with(
        &self,
        identity: &IdentityId,
        algorithm: AlgorithmId,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, SigningError> {
        self.inner.verify_with(identity, algorithm, message, signature)
    }

    fn identity(&self, identity: &IdentityId) -> Result<Identity, SigningError> {
        self.inner.identity(identity)
    }
}

/// Batch size `batch_size`, a flush interval long enough that only explicit
/// flushes seal partial blocks, and a fast two-attempt retry budget.
pub fn ledger_config(batch_size: usize) -> LedgerConfig {
    LedgerConfig {
        batch_size,
        flush_interval_ms: 10_000,
        max_buffered_records: 1_000,
        signing: SigningRetryConfig {
            sign_timeout_ms: 5_000,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            max_sign_attempts: 2,
            max_signing_threads: 4,
        },
    }
}

pub struct Harness {
    pub time: ManualTimeSource,
    pub kv: InMemoryKVStore,
    pub store: Arc<BlockStore<InMemoryKVStore>>,
    pub service: Arc<Service>,
    pub signer: Arc<SwitchableSigner>,
    pub identity: IdentityId,
    pub bus: Arc<InMemoryEventBus>,
    pub verifier: Arc<IntegrityVerifier>,
    pub ledger: LedgerCore,
    pub ingest: Arc<IngestGateway>,
    pub query: Arc<QueryService>,
}

impl Harness {
    pub fn new(config: LedgerConfig) -> Self {
        let time = ManualTimeSource::new(NOW);
        let time_source: Arc<dyn TimeSource> = Arc::new(time.clone());
        let kv = InMemoryKVStore::new();
        let store = Arc::new(BlockStore::with_defaults(kv.clone(), time_source.clone()));
        let service = Arc::new(SignatureService::new(
            AlgorithmRegistry::post_quantum(),
            InMemoryIdentityRepository::new(),
            time_source.clone(),
        ));
        let identity = service
            .generate_identity(AlgorithmId::Dilithium2)
            .expect("generate signing identity");
        let signer = Arc::new(SwitchableSigner {
            inner: service.clone(),
            outage: AtomicBool::new(false),
            sign_calls: AtomicU32::new(0),
        });
        let bus = Arc::new(InMemoryEventBus::new());
        let verifier = Arc::new(
            IntegrityVerifier::new(
                store.clone(),
                signer.clone(),
                time_source.clone(),
                AuditConfig {
                    chunk_size: 4,
                    interval_ms: 0,
                },
            )
            .with_bus(bus.clone()),
        );
        let ledger = LedgerCore::open(
            LedgerDependencies {
                store: store.clone(),
                signer: signer.clone(),
                verifier: verifier.clone(),
                bus: bus.clone(),
                time_source: time_source.clone(),
            },
            config,
            identity.clone(),
        )
        .expect("open ledger");
        let ingest = Arc::new(IngestGateway::new(
            Arc::new(ledger.clone()),
            bus.clone(),
            time_source,
            IngestConfig::default(),
        ));
        let query = Arc::new(QueryService::new(
            store.clone(),
            ql_04_ledger_core::LedgerApi::subscribe_head(&ledger),
        ));

        Self {
            time,
            kv,
            store,
            service,
            signer,
            identity,
            bus,
            verifier,
            ledger,
            ingest,
            query,
        }
    }

    pub fn event(id: &str) -> IngestEvent {
        IngestEvent {
            event_id: id.to_string(),
            timestamp: NOW - 1_000,
            actor_id: "agent-7".to_string(),
            case_id: format!("case-{id}"),
            event_type: "interaction_logged".to_string(),
            payload: serde_json::json!({ "channel": "email", "ref": id }),
        }
    }

    pub async fn submit(&self, id: &str) -> SubmitOutcome {
        self.ingest
            .submit_event(Self::event(id))
            .await
            .expect("submit event")
    }

    pub fn committed_blocks(&self) -> Vec<Block> {
        let head = self.store.head().expect("read head");
        match head.last_sequence() {
            Some(last) => self.store.read_block_range(0, last).expect("read blocks"),
            None => Vec::new(),
        }
    }

    pub fn committed_ids(&self) -> Vec<String> {
        self.committed_blocks()
            .iter()
            .flat_map(|b| b.records.iter().map(|r| r.id().to_string()))
            .collect()
    }

    /// Flip one payload byte of a stored record and rewrite the entry with a
    /// matching checksum, as an attacker with raw store access would.
    pub fn tamper_payload(&self, sequence: u64, record: usize) {
        let stored = self.store.read_stored(sequence).expect("read stored block");
        let mut json = serde_json::to_value(&stored.block).expect("block to json");
        let byte = &mut json["records"][record]["payload"][0];
        let flipped = byte.as_u64().expect("payload byte") ^ 0x01;
        *byte = serde_json::json!(flipped);
        let tampered: Block = serde_json::from_value(json).expect("json to block");

        let bytes = BincodeBlockSerializer
            .checksum_bytes(&tampered)
            .expect("checksum bytes");
        let checksum = DefaultChecksumProvider.compute_crc32(&bytes);
        let entry = BincodeBlockSerializer
            .serialize(&StoredBlock::new(tampered, stored.stored_at, checksum))
            .expect("serialize block");
        self.kv
            .put(&KeyPrefix::block_key(sequence), &entry)
            .expect("overwrite block");
    }
}
