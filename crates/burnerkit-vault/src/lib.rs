//! # Burnerkit Vault
//!
//! The stateful half of key management: the encrypted master vault, the
//! burner registry, imported-key overrides, and the lock session.
//!
//! ## Key Types
//!
//! - [`Vault`] - Onboarding, burner generation, import, resolution, export
//! - [`SessionManager`] - Lock state, expiry, liveness
//! - [`SecretHolder`] - The one in-memory copy of the session password
//! - [`ImportedKeyRecord`] - Encrypted per-slot private key override
//!
//! ## Invariants
//!
//! - Re-derived addresses must match stored ones, or the key is withheld
//! - Retired indices are never allocated again
//! - The password is never written to the store

pub mod error;
pub mod migration;
pub mod secret;
pub mod session;
pub mod vault;

pub use error::{Result, VaultError};
pub use migration::{migrate_keyspace, MigrationReport};
pub use secret::SecretHolder;
pub use session::{SessionConfig, SessionManager, SessionState};
pub use vault::{ImportedKeyRecord, Vault, VaultConfig};
