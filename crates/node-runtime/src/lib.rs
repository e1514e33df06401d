//! # Node Runtime Library
//!
//! Builds a Quantum-Ledger node from configuration and runs its background
//! tasks. The binary in `main.rs` is a thin wrapper; integration tests drive
//! `NodeRuntime` and `SubsystemContainer` directly.
//!
//! ## Modules
//!
//! - `container/` - configuration and subsystem wiring
//! - `adapters/` - identity persistence, signer key file, alert sink
//! - `runtime` - task lifecycle and graceful shutdown

pub mod adapters;
pub mod container;
pub mod runtime;

pub use container::{ConfigError, NodeConfig, SignerConfig, SubsystemContainer};
pub use runtime::NodeRuntime;
