//! # Inbound Ports (Driving Ports / API)

use crate::error::Result;
use futures::stream::BoxStream;
use shared_types::{Block, Record};

/// Live stream of committed records.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// Read-only access for consumers. Nothing past the committed head is
/// visible through this API.
pub trait QueryApi: Send + Sync {
    /// Look a record up by id.
    ///
    /// # Errors
    /// * `RecordNotFound` - unknown id, or its block is not committed yet
    fn get_record(&self, id: &str) -> Result<Record>;

    /// # Errors
    /// * `BlockNotFound` - sequence at or beyond the committed head
    fn get_block(&self, sequence: u64) -> Result<Block>;

    /// Records of committed blocks `from..=to`, clipped to the head.
    fn records_in_range(&self, from: u64, to: u64) -> Result<Vec<Record>>;

    /// Records of every block with sequence `>= since`, in order, following
    /// the head as it advances. Ends when the ledger shuts down.
    fn stream_records(&self, since: u64) -> RecordStream;

    /// Number of committed blocks.
    fn committed_length(&self) -> u64;
}
