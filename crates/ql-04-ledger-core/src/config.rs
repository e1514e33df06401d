//! Configuration types for the ledger core

use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration for buffering and sealing
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Records per block. Reaching it wakes the sealer.
    pub batch_size: usize,

    /// Seal whatever is buffered at least this often (milliseconds).
    pub flush_interval_ms: u64,

    /// Hard limit on the open buffer; `append` fails beyond it.
    pub max_buffered_records: usize,

    /// Signing attempts per sealed block
    pub signing: SigningRetryConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            flush_interval_ms: 1_000,
            max_buffered_records: 10_000,
            signing: SigningRetryConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Retry policy for the signing call
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SigningRetryConfig {
    /// Upper bound on one signing attempt (milliseconds)
    pub sign_timeout_ms: u64,

    /// First backoff delay; doubles per attempt (milliseconds)
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub max_backoff_ms: u64,

    /// Attempts before a block is parked as FailedPending
    pub max_sign_attempts: u32,

    /// Blocking threads signing may occupy at once. An attempt that timed
    /// out keeps its thread until the backend returns.
    pub max_signing_threads: usize,
}

impl Default for SigningRetryConfig {
    fn default() -> Self {
        Self {
            sign_timeout_ms: 5_000,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            max_sign_attempts: 5,
            max_signing_threads: 4,
        }
    }
}

impl SigningRetryConfig {
    pub fn sign_timeout(&self) -> Duration {
        Duration::from_millis(self.sign_timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
