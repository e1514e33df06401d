//! # Outbound Ports (Driven Ports / SPI)

use shared_types::{Identity, IdentityId};
use thiserror::Error;

/// Error from the identity store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Identity store backend error: {0}")]
    Backend(String),

    #[error("Corrupted identity entry for {0}")]
    Corrupted(String),
}

/// Where registered identities live.
pub trait IdentityRepository: Send + Sync {
    fn get(&self, id: &IdentityId) -> Result<Option<Identity>, RepositoryError>;

    /// Insert or overwrite.
    fn put(&self, identity: &Identity) -> Result<(), RepositoryError>;

    fn list(&self) -> Result<Vec<Identity>, RepositoryError>;
}
