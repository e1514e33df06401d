//! # Adapters
//!
//! Concrete key-value backends and the data directory lock.

pub mod lock;
pub mod storage;
