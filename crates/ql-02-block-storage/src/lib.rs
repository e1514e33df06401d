//! # Block Storage Subsystem (QL-02)
//!
//! Durable home of the committed chain.
//!
//! ## Key Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `b:{seq:be64}` | `StoredBlock` (block + CRC32 + stored_at) |
//! | `r:{record_id}` | sequence of the block holding the record |
//! | `p:{seq:be64}` | sealed block awaiting its signature |
//! | `m:head` | `ChainHead` (committed length + last hash) |
//! | `m:checkpoint` | last audited `Checkpoint` |
//!
//! ## Invariants
//!
//! - Commits are gapless: block `n` is only accepted when the head length is `n`
//!   and its `previous_hash` equals the head hash.
//! - A commit is one atomic batch: block, record index entries, head, and
//!   pending-slot removal land together or not at all.
//! - Every read re-checks the CRC32 written at commit time.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::lock::{DataDirLock, LockError};
pub use adapters::storage::{FileBackedKVStore, InMemoryKVStore};
pub use domain::config::{StorageBackend, StorageConfig};
pub use domain::entities::{ChainHead, KeyPrefix, StoredBlock};
pub use domain::errors::{KVStoreError, SerializationError, StorageError};
pub use ports::inbound::BlockStorageApi;
pub use ports::outbound::{
    BatchOperation, BincodeBlockSerializer, BlockSerializer, ChecksumProvider,
    DefaultChecksumProvider, KeyValueStore,
};
pub use service::{BlockStore, BlockStoreDependencies};
