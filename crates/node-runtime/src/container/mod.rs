//! # Subsystem Container
//!
//! Central container holding all subsystem instances with proper lifetime
//! management and dependency injection.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig, SignerConfig};
pub use subsystems::SubsystemContainer;
