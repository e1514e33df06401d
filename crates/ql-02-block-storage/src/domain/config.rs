//! # Storage Configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Which key-value backend holds the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile. Tests and demos only.
    Memory,
    /// Single data file with atomic temp-file rename, guarded by a process lock.
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    /// How long to wait for another process to release the data directory.
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: PathBuf::from("./data"),
            lock_timeout_ms: 5_000,
        }
    }
}

impl StorageConfig {
    /// Config for an in-memory store.
    pub fn in_memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Self::default()
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
