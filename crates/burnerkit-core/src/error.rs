//! Error types for burnerkit core primitives.

use thiserror::Error;

use crate::types::NetworkFamily;

/// Errors produced by the pure vault primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Authenticated decryption failed: wrong password or corrupted ciphertext.
    ///
    /// Carries no detail on purpose; callers must not learn which input was bad.
    #[error("incorrect password")]
    Crypto,

    /// A re-derived address does not match the address on record.
    #[error("integrity failure for {network} index {index}: derived address does not match stored address")]
    Integrity { network: NetworkFamily, index: u32 },

    /// The private key encoding was not recognised.
    #[error("unrecognized private key format: {0}")]
    Format(String),

    /// The mnemonic phrase failed BIP39 validation.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// HD derivation failed (bad path, invalid child key).
    #[error("derivation error: {0}")]
    Derivation(String),

    /// An encryption parameter was out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Encryption itself failed.
    #[error("encryption error: {0}")]
    Encryption(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
