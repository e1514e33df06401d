//! # Signing & Verification Service (QL-01)
//!
//! Signs sealed blocks on behalf of a registered identity and verifies block
//! signatures for the integrity verifier.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): signature schemes, the algorithm registry,
//!   local secret key storage
//! - **Ports Layer** (`ports/`): `SigningApi` / `IdentityProvisioning` (inbound),
//!   `IdentityRepository` (outbound)
//! - **Service Layer** (`service.rs`): resolves identities, enforces revocation,
//!   dispatches to the registered scheme
//! - **Adapters** (`adapters/`): in-memory identity repository
//!
//! ## Algorithms
//!
//! | Id | Scheme | Post-quantum |
//! |----|--------|--------------|
//! | `dilithium2` | CRYSTALS-Dilithium level 2 | yes |
//! | `dilithium3` | CRYSTALS-Dilithium level 3 | yes |
//! | `ed25519` | Ed25519 (legacy, verification during migration) | no |
//!
//! ## Security Notes
//!
//! - Revocation is forward-only: a block signed before `revoked_at` stays valid.
//! - Secret keys never leave the local key store and are zeroized on drop.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::memory::InMemoryIdentityRepository;
pub use domain::errors::SigningError;
pub use domain::keystore::{LocalKeyStore, SecretKeyMaterial};
pub use domain::registry::AlgorithmRegistry;
pub use domain::schemes::{Dilithium2Scheme, Dilithium3Scheme, Ed25519Scheme, SignatureScheme};
pub use ports::inbound::{IdentityProvisioning, SigningApi};
pub use ports::outbound::{IdentityRepository, RepositoryError};
pub use service::SignatureService;
