//! Configuration for integrity audits

use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Blocks verified per parallel chunk. Cancellation is checked between chunks.
    pub chunk_size: usize,

    /// Period of the background incremental audit (0 disables it).
    pub interval_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            interval_ms: 60_000,
        }
    }
}

impl AuditConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }
}
