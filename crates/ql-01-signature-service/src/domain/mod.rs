//! Domain layer: schemes, registry and key material. No I/O.

pub mod errors;
pub mod keystore;
pub mod registry;
pub mod schemes;
