//! # Shared Types Crate
//!
//! This crate contains the ledger's domain entities and the canonical hashing
//! rules every subsystem relies on.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Anything that contributes to a block hash is
//!   defined and encoded here, so writers and auditors can never disagree.
//! - **Immutability**: Records and committed Blocks expose no mutators; a
//!   change of content is only possible by building a new value.
//! - **Domain Separation**: Every hash preimage starts with a versioned tag.

pub mod entities;
pub mod errors;
pub mod hashing;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use hashing::{hash_eq, Hash, LedgerHasher, GENESIS_HASH};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
