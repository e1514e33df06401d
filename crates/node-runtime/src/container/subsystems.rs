//! # Subsystem Container
//!
//! Holds all subsystem instances and wires them together.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: Key-value store, event bus, time source
//! Level 1: Block Storage (ql-02), Signature Service (ql-01)
//! Level 2: Integrity Verifier (ql-03)
//! Level 3: Ledger Core (ql-04), recovers pending blocks
//! Level 4: Ingest Gateway (ql-05), Query/Export (ql-06)
//! ```
//!
//! The block store and the identity repository share one key-value store,
//! so a file-backed node keeps chain and identities in the same locked
//! data directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use ql_01_signature_service::{
    AlgorithmRegistry, IdentityProvisioning, SignatureService, SigningApi, SigningError,
};
use ql_02_block_storage::{
    BlockStore, FileBackedKVStore, InMemoryKVStore, KeyValueStore, StorageBackend,
};
use ql_03_integrity_verifier::IntegrityVerifier;
use ql_04_ledger_core::{LedgerApi, LedgerCore, LedgerDependencies};
use ql_05_ingest_gateway::IngestGateway;
use ql_06_query_export::QueryService;
use shared_bus::InMemoryEventBus;
use shared_types::{AlgorithmId, IdentityId, SystemTimeSource, TimeSource};

use crate::adapters::{KvIdentityRepository, SignerKey};
use crate::container::config::NodeConfig;

pub type SharedKv = Arc<dyn KeyValueStore>;
pub type NodeStore = BlockStore<SharedKv>;
pub type NodeSigner = SignatureService<KvIdentityRepository<SharedKv>>;

/// Central container holding all subsystem instances.
pub struct SubsystemContainer {
    pub config: NodeConfig,
    pub time_source: Arc<dyn TimeSource>,
    pub event_bus: Arc<InMemoryEventBus>,
    pub store: Arc<NodeStore>,
    pub signer: Arc<NodeSigner>,
    pub verifier: Arc<IntegrityVerifier>,
    pub ledger: LedgerCore,
    pub ingest: Arc<IngestGateway>,
    pub query: Arc<QueryService>,
    /// `None` for an in-memory node with an ephemeral key.
    key_path: Option<PathBuf>,
}

impl SubsystemContainer {
    pub fn new(config: NodeConfig) -> Result<Self> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    #[instrument(name = "subsystem_init", skip_all)]
    pub fn with_time_source(config: NodeConfig, time_source: Arc<dyn TimeSource>) -> Result<Self> {
        info!("[node] Initializing Quantum-Ledger subsystem container");

        // Level 0
        let kv: SharedKv = match config.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryKVStore::new()),
            StorageBackend::File => Arc::new(
                FileBackedKVStore::open(&config.storage.data_dir, config.storage.lock_timeout())
                    .with_context(|| {
                        format!("opening data dir {}", config.storage.data_dir.display())
                    })?,
            ),
        };
        let event_bus = Arc::new(InMemoryEventBus::new());

        // Level 1
        let store = Arc::new(BlockStore::with_defaults(kv.clone(), time_source.clone()));
        let signer = Arc::new(SignatureService::new(
            AlgorithmRegistry::with_all(),
            KvIdentityRepository::new(kv),
            time_source.clone(),
        ));
        info!("  [ql-01] Signature service ready");

        let key_path = match (config.storage.backend, &config.signer.key_file) {
            (StorageBackend::Memory, None) => None,
            _ => Some(config.signer_key_path()),
        };
        let signer_id = load_signer(&signer, key_path.as_deref(), &config, time_source.as_ref())?;

        // Level 2
        let verifier = Arc::new(
            IntegrityVerifier::new(
                store.clone(),
                signer.clone(),
                time_source.clone(),
                config.audit.clone(),
            )
            .with_bus(event_bus.clone()),
        );
        info!("  [ql-03] Integrity verifier ready");

        // Level 3
        let ledger = LedgerCore::open(
            LedgerDependencies {
                store: store.clone(),
                signer: signer.clone(),
                verifier: verifier.clone(),
                bus: event_bus.clone(),
                time_source: time_source.clone(),
            },
            config.ledger.clone(),
            signer_id,
        )
        .context("opening ledger")?;
        info!(
            head = ledger.head_sequence(),
            "  [ql-04] Ledger core ready"
        );

        // Level 4
        let ingest = Arc::new(IngestGateway::new(
            Arc::new(ledger.clone()),
            event_bus.clone(),
            time_source.clone(),
            config.ingest.clone(),
        ));
        ingest
            .rebuild_index(store.as_ref())
            .context("rebuilding dedup index")?;
        let query = Arc::new(QueryService::new(store.clone(), ledger.subscribe_head()));
        info!("  [ql-05] Ingest gateway ready");
        info!("  [ql-06] Query interface ready");

        Ok(Self {
            config,
            time_source,
            event_bus,
            store,
            signer,
            verifier,
            ledger,
            ingest,
            query,
            key_path,
        })
    }

    /// Replace the signing key with a fresh one under `algorithm`. The old
    /// key file is kept aside; blocks it signed stay verifiable through the
    /// registered identity. Fails with `SigningError::VerificationOnly` for a
    /// classical algorithm and leaves the current key in place.
    pub fn rotate_signer(&self, algorithm: AlgorithmId) -> Result<IdentityId> {
        let id = install_new_key(
            &self.signer,
            self.key_path.as_deref(),
            algorithm,
            self.time_source.now(),
        )?;
        self.ledger.set_signer(id.clone());
        Ok(id)
    }
}

/// Load the persisted key (or create one) and make sure it may still sign.
fn load_signer(
    signer: &NodeSigner,
    key_path: Option<&std::path::Path>,
    config: &NodeConfig,
    time_source: &dyn TimeSource,
) -> Result<IdentityId> {
    let algorithm = config.signer.algorithm;
    let Some(path) = key_path else {
        let id = signer.generate_identity(algorithm)?;
        warn!(identity = %id, "[node] Using an ephemeral signing key (in-memory storage)");
        return Ok(id);
    };

    let key = SignerKey::load_or_create(path, signer.registry(), algorithm)?;
    let id = signer.import_signing_key(key.public_key.clone(), key.algorithm, key.secret.clone())?;

    let now = time_source.now();
    if signer.identity(&id)?.is_revoked_at(now) {
        warn!(identity = %id, "[node] Signer key is revoked, rotating");
        return install_new_key(signer, Some(path), algorithm, now);
    }
    info!(identity = %id, algorithm = %key.algorithm, "[node] Signing identity loaded");
    Ok(id)
}

fn install_new_key(
    signer: &NodeSigner,
    key_path: Option<&std::path::Path>,
    algorithm: AlgorithmId,
    now: shared_types::Timestamp,
) -> Result<IdentityId> {
    // Checked before the current key file is touched.
    if !algorithm.is_post_quantum() {
        return Err(SigningError::VerificationOnly(algorithm).into());
    }
    let key = SignerKey::generate(signer.registry(), algorithm)?;
    if let Some(path) = key_path {
        if path.exists() {
            let retired = SignerKey::retire(path, now)?;
            info!(retired = %retired.display(), "[node] Previous signer key retired");
        }
        key.save(path)?;
    }
    let SignerKey {
        algorithm,
        public_key,
        secret,
    } = key;
    let id = signer.import_signing_key(public_key, algorithm, secret)?;
    info!(identity = %id, %algorithm, "[node] Signer rotated");
    Ok(id)
}
