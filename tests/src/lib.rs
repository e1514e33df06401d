//! # Quantum-Ledger Test Suite
//!
//! Cross-subsystem tests. Unit tests live beside the code in each crate;
//! everything here needs more than one subsystem wired together.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs              # in-process ledger wiring with a switchable signer
//! └── integration/
//!     ├── chain_properties.rs # linkage, contiguity, signatures, tamper evidence
//!     ├── scenarios.rs        # batching, concurrency, revocation, signing outage
//!     └── node_lifecycle.rs   # node-runtime restart, key rotation, streams
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ql-tests
//! cargo test -p ql-tests integration::scenarios::
//! ```

pub mod harness;
pub mod integration;
