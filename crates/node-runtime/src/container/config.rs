//! # Node Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults
//! 2. JSON file named by `QL_CONFIG`
//! 3. `QL_*` environment variables
//!
//! `validate()` runs after all sources are applied.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use ql_02_block_storage::{StorageBackend, StorageConfig};
use ql_03_integrity_verifier::AuditConfig;
use ql_04_ledger_core::LedgerConfig;
use ql_05_ingest_gateway::IngestConfig;
use shared_types::AlgorithmId;

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub ingest: IngestConfig,
    pub audit: AuditConfig,
    pub signer: SignerConfig,
}

/// Which key this node signs with.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Scheme used when a new signing key has to be generated.
    pub algorithm: AlgorithmId,
    /// Key file location. Defaults to `<data_dir>/signer.key`.
    pub key_file: Option<PathBuf>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmId::Dilithium2,
            key_file: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("Invalid config file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl NodeConfig {
    /// Defaults, then `QL_CONFIG`, then `QL_*` overrides from the process
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("QL_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `QL_*` overrides. `lookup` returns the raw variable value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("QL_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("QL_STORAGE_BACKEND") {
            self.storage.backend = match value.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "file" => StorageBackend::File,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "QL_STORAGE_BACKEND",
                        value,
                    })
                }
            };
        }
        if let Some(path) = lookup("QL_SIGNER_KEY_FILE") {
            self.signer.key_file = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("QL_SIGNING_ALGORITHM") {
            self.signer.algorithm = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "QL_SIGNING_ALGORITHM",
                value,
            })?;
        }

        parse_into(&lookup, "QL_BATCH_SIZE", &mut self.ledger.batch_size)?;
        parse_into(&lookup, "QL_FLUSH_INTERVAL_MS", &mut self.ledger.flush_interval_ms)?;
        parse_into(&lookup, "QL_MAX_BUFFERED", &mut self.ledger.max_buffered_records)?;
        parse_into(&lookup, "QL_SIGN_TIMEOUT_MS", &mut self.ledger.signing.sign_timeout_ms)?;
        parse_into(&lookup, "QL_MAX_SIGN_ATTEMPTS", &mut self.ledger.signing.max_sign_attempts)?;
        parse_into(
            &lookup,
            "QL_MAX_SIGNING_THREADS",
            &mut self.ledger.signing.max_signing_threads,
        )?;
        parse_into(&lookup, "QL_AUDIT_INTERVAL_MS", &mut self.audit.interval_ms)?;
        parse_into(&lookup, "QL_AUDIT_CHUNK_SIZE", &mut self.audit.chunk_size)?;
        parse_into(&lookup, "QL_MAX_PAYLOAD_BYTES", &mut self.ingest.max_payload_bytes)?;
        Ok(())
    }

    /// Reject values the subsystems cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ledger = &self.ledger;
        if ledger.batch_size == 0 {
            return Err(ConfigError::Invalid("ledger.batch_size must be > 0".into()));
        }
        if ledger.max_buffered_records < ledger.batch_size {
            return Err(ConfigError::Invalid(format!(
                "ledger.max_buffered_records ({}) is below batch_size ({})",
                ledger.max_buffered_records, ledger.batch_size
            )));
        }
        if ledger.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid("ledger.flush_interval_ms must be > 0".into()));
        }
        if ledger.signing.sign_timeout_ms == 0 || ledger.signing.max_sign_attempts == 0 {
            return Err(ConfigError::Invalid(
                "ledger.signing needs a timeout and at least one attempt".into(),
            ));
        }
        if ledger.signing.max_signing_threads == 0 {
            return Err(ConfigError::Invalid(
                "ledger.signing.max_signing_threads must be > 0".into(),
            ));
        }
        if ledger.signing.initial_backoff_ms > ledger.signing.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "ledger.signing.initial_backoff_ms exceeds max_backoff_ms".into(),
            ));
        }
        if self.audit.chunk_size == 0 {
            return Err(ConfigError::Invalid("audit.chunk_size must be > 0".into()));
        }
        if self.ingest.max_payload_bytes == 0 || self.ingest.max_id_len == 0 {
            return Err(ConfigError::Invalid("ingest limits must be > 0".into()));
        }
        if !self.signer.algorithm.is_post_quantum() {
            return Err(ConfigError::Invalid(format!(
                "{} is verification-only; new signing keys must be post-quantum",
                self.signer.algorithm
            )));
        }
        Ok(())
    }

    /// Where the node keeps its signing key.
    pub fn signer_key_path(&self) -> PathBuf {
        self.signer
            .key_file
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("signer.key"))
    }
}

fn parse_into<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(value) = lookup(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value })?;
    }
    Ok(())
}
