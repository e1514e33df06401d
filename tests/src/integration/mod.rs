//! # Integration Tests

mod chain_properties;
mod node_lifecycle;
mod scenarios;
