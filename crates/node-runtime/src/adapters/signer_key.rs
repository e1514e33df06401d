//! # Signer Key File
//!
//! The node's signing keypair, kept next to the chain data so the same
//! identity signs across restarts.
//!
//! ```json
//! {"algorithm": "dilithium2", "public_key": "<hex>", "secret_key": "<hex>"}
//! ```
//!
//! Written via temp file + rename with owner-only permissions on unix.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use ql_01_signature_service::{AlgorithmRegistry, SecretKeyMaterial, SigningError};
use shared_types::{AlgorithmId, Timestamp};

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("Key file I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Key file {path} is malformed: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Key generation failed: {0}")]
    Generation(#[from] SigningError),
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyFileContents {
    #[zeroize(skip)]
    algorithm: AlgorithmId,
    public_key: String,
    secret_key: String,
}

/// A keypair loaded from (or just written to) the key file.
pub struct SignerKey {
    pub algorithm: AlgorithmId,
    pub public_key: Vec<u8>,
    pub secret: SecretKeyMaterial,
}

impl SignerKey {
    pub fn generate(
        registry: &AlgorithmRegistry,
        algorithm: AlgorithmId,
    ) -> Result<Self, KeyFileError> {
        let (public_key, secret) = registry.get(algorithm)?.generate_keypair();
        Ok(Self {
            algorithm,
            public_key,
            secret,
        })
    }

    /// Load the key at `path`, or generate one with `algorithm` and write it.
    pub fn load_or_create(
        path: &Path,
        registry: &AlgorithmRegistry,
        algorithm: AlgorithmId,
    ) -> Result<Self, KeyFileError> {
        if path.exists() {
            let key = Self::load(path)?;
            if key.algorithm != algorithm {
                warn!(
                    path = %path.display(),
                    file = %key.algorithm,
                    configured = %algorithm,
                    "[node] Signer key file algorithm differs from config; using key file"
                );
            }
            return Ok(key);
        }
        let key = Self::generate(registry, algorithm)?;
        key.save(path)?;
        info!(path = %path.display(), %algorithm, "[node] Generated new signer key");
        Ok(key)
    }

    pub fn load(path: &Path) -> Result<Self, KeyFileError> {
        let text = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| io_error(path, e))?);
        let contents: KeyFileContents =
            serde_json::from_str(&text).map_err(|e| malformed(path, e))?;
        let public_key = hex::decode(&contents.public_key).map_err(|e| malformed(path, e))?;
        let secret = hex::decode(&contents.secret_key).map_err(|e| malformed(path, e))?;
        Ok(Self {
            algorithm: contents.algorithm,
            public_key,
            secret: SecretKeyMaterial::new(secret),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), KeyFileError> {
        let contents = KeyFileContents {
            algorithm: self.algorithm,
            public_key: hex::encode(&self.public_key),
            secret_key: hex::encode(self.secret.as_bytes()),
        };
        let json = Zeroizing::new(
            serde_json::to_vec_pretty(&contents).map_err(|e| malformed(path, e))?,
        );

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        let tmp = path.with_extension("tmp");
        {
            let mut file = open_private(&tmp).map_err(|e| io_error(&tmp, e))?;
            file.write_all(&json).map_err(|e| io_error(&tmp, e))?;
            file.sync_all().map_err(|e| io_error(&tmp, e))?;
        }
        std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))
    }

    /// Move the current key file aside so a new key can take its place.
    pub fn retire(path: &Path, now: Timestamp) -> Result<PathBuf, KeyFileError> {
        let mut retired = path.as_os_str().to_owned();
        retired.push(format!(".retired-{now}"));
        let retired = PathBuf::from(retired);
        std::fs::rename(path, &retired).map_err(|e| io_error(path, e))?;
        Ok(retired)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}

fn io_error(path: &Path, e: std::io::Error) -> KeyFileError {
    KeyFileError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn malformed(path: &Path, e: impl std::fmt::Display) -> KeyFileError {
    KeyFileError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
