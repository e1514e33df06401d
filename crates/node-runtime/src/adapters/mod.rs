//! # Runtime Adapters
//!
//! Port implementations that only make sense inside a running node.

pub mod alert_log;
pub mod identity_store;
pub mod signer_key;

pub use alert_log::AlertLogger;
pub use identity_store::KvIdentityRepository;
pub use signer_key::{KeyFileError, SignerKey};
