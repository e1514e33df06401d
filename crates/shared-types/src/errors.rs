//! # Error Types
//!
//! Parsing errors for the wire names of domain enums.

use thiserror::Error;

/// Errors raised when decoding a domain value from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Event type name not recognised.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// Algorithm name not recognised.
    #[error("Unknown algorithm identifier: {0}")]
    UnknownAlgorithm(String),
}
