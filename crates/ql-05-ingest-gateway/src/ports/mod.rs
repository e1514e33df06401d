//! # Inbound Ports (Driving Ports / API)

use crate::domain::event::{IngestEvent, SubmitOutcome};
use crate::error::IngestError;
use async_trait::async_trait;

/// Entry point for case-management and communication systems.
///
/// Safe to call concurrently. Dropping a submission future before it
/// resolves leaves no trace: the event id can be submitted again.
/// `Duplicate` means the id was already accepted; a submission racing an
/// in-flight append of the same id waits for it first.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Validate, deduplicate and append one event.
    ///
    /// # Errors
    /// * `CapacityExceeded` - ledger buffer full; resubmit later
    /// * `Ledger` - the ledger refused the record (closed, storage failure)
    async fn submit_event(&self, event: IngestEvent) -> Result<SubmitOutcome, IngestError>;

    /// Decode a JSON event and submit it. Undecodable input is `Rejected`.
    async fn submit_json(&self, bytes: &[u8]) -> Result<SubmitOutcome, IngestError>;
}
