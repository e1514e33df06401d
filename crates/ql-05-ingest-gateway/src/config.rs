//! Configuration for inbound event validation

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Largest accepted payload after canonical encoding (bytes)
    pub max_payload_bytes: usize,

    /// How far in the future an event timestamp may be (milliseconds)
    pub max_clock_skew_ms: u64,

    /// Longest accepted event, actor or case id (characters)
    pub max_id_len: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024,
            max_clock_skew_ms: 5 * 60 * 1000,
            max_id_len: 128,
        }
    }
}
