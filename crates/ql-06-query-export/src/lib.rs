//! # Query/Export Subsystem (QL-06)
//!
//! Read-only views over committed blocks. Visibility follows the committed
//! head published by the ledger core, so a block that is stored but not yet
//! announced never shows up here.
//!
//! `stream_records` is a lazy stream: it yields what is committed, waits on
//! the head channel for more, and ends once the ledger has shut down.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::cursor::RecordCursor;
pub use error::QueryError;
pub use ports::{QueryApi, RecordStream};
pub use service::QueryService;
