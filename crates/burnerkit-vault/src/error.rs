//! Error types for the vault and session manager.

use burnerkit_core::{CoreError, NetworkFamily};
use burnerkit_store::StoreError;
use thiserror::Error;

/// Errors that can occur during vault and session operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Cryptographic, derivation or format error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// No master vault has been created yet.
    #[error("vault not initialized")]
    NotInitialized,

    /// Onboarding was attempted a second time.
    #[error("vault already initialized")]
    AlreadyInitialized,

    /// The session is locked or has expired.
    #[error("session expired")]
    SessionExpired,

    /// No burner at this slot.
    #[error("no {network} burner at index {index}")]
    BurnerNotFound { network: NetworkFamily, index: u32 },

    /// The slot is retired and cannot be reused.
    #[error("{network} index {index} is retired")]
    IndexRetired { network: NetworkFamily, index: u32 },

    /// The index does not fit a derivation path component.
    #[error("{network} index {index} is out of range")]
    IndexOutOfRange { network: NetworkFamily, index: u32 },

    /// No index left to allocate.
    #[error("{0} index space exhausted")]
    IndexExhausted(NetworkFamily),

    /// The operation does not apply to this vault.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl VaultError {
    /// Wrong password or corrupted ciphertext.
    pub fn is_crypto(&self) -> bool {
        matches!(self, VaultError::Core(CoreError::Crypto))
    }

    /// Derived address did not match the stored one.
    pub fn is_integrity(&self) -> bool {
        matches!(self, VaultError::Core(CoreError::Integrity { .. }))
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
