//! # Ingest Gateway Subsystem (QL-05)
//!
//! Turns producer events into ledger records.
//!
//! ## Flow
//!
//! ```text
//! JSON / IngestEvent → validate → reserve id → LedgerApi::append → keep id
//!                          │            │               │
//!                      Rejected     Duplicate    CapacityExceeded (id released)
//! ```
//!
//! The dedup index is seeded from storage at startup so an event that was
//! committed or sealed before a restart is still a `Duplicate`. A resubmit
//! that races an in-flight append of the same id waits for that append and
//! only reports `Duplicate` if it succeeded.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use config::IngestConfig;
pub use domain::dedup::{Claim, DedupIndex, DedupState, Reservation, Settled};
pub use domain::event::{IngestEvent, SubmitOutcome};
pub use domain::validation::Rejection;
pub use error::IngestError;
pub use ports::IngestApi;
pub use service::{IngestGateway, IngestStats};
