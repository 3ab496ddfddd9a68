//! Error types for the extension facade.

use burnerkit_bridge::BridgeError;
use burnerkit_core::CoreError;
use burnerkit_store::StoreError;
use burnerkit_vault::VaultError;
use thiserror::Error;

/// Errors that can occur during extension operations.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Vault or session error.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Bridge error.
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl ExtensionError {
    /// Wrong password or corrupt ciphertext.
    pub fn is_crypto(&self) -> bool {
        match self {
            ExtensionError::Core(CoreError::Crypto) => true,
            ExtensionError::Vault(e) => e.is_crypto(),
            _ => false,
        }
    }
}

/// Result type for extension operations.
pub type Result<T> = std::result::Result<T, ExtensionError>;
