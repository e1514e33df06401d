//! # Outbound Ports (Driven Ports)
//!
//! The ledger core drives the signing service, the block store, the verifier
//! and the event bus. All are shared with other subsystems, hence `Arc<dyn _>`.

use ql_01_signature_service::SigningApi;
use ql_02_block_storage::BlockStorageApi;
use ql_03_integrity_verifier::IntegrityVerifierApi;
use shared_bus::EventPublisher;
use shared_types::TimeSource;
use std::sync::Arc;

/// Dependencies for LedgerCore
#[derive(Clone)]
pub struct LedgerDependencies {
    pub store: Arc<dyn BlockStorageApi>,
    pub signer: Arc<dyn SigningApi>,
    pub verifier: Arc<dyn IntegrityVerifierApi>,
    pub bus: Arc<dyn EventPublisher>,
    pub time_source: Arc<dyn TimeSource>,
}
