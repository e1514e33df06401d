//! # Ledger Core Subsystem (QL-04)
//!
//! The single writer of the chain. Accepted records are buffered, sealed into
//! hash-linked blocks, signed by the signature service and committed in
//! strict sequence order.
//!
//! ## Block Lifecycle
//!
//! ```text
//! Buffering → Sealing → Signing → Committed
//!                          │  ▲
//!                          ▼  │ re-drive
//!                     FailedPending
//! ```
//!
//! ## Invariants
//!
//! - Sealing is serialized by one mutex around the chain tip, so sequence
//!   numbers are gapless and each block links to the previously sealed one.
//! - Commit order equals seal order even when later signatures finish first.
//! - A block that cannot be signed keeps its records and parks as
//!   `FailedPending`; sealing pauses until it is re-driven.
//! - Readers only see blocks at or below the committed head.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use config::{LedgerConfig, SigningRetryConfig};
pub use domain::CommittedHead;
pub use error::LedgerError;
pub use ports::inbound::LedgerApi;
pub use ports::outbound::LedgerDependencies;
pub use service::LedgerCore;
