//! Error types for the approval bridge.
//!
//! Every error maps onto one provider error code. Pages only ever see the
//! code and a generic message.

use burnerkit_store::StoreError;
use burnerkit_vault::VaultError;
use thiserror::Error;

use crate::messages::ProviderError;

/// EIP-1193 / JSON-RPC error codes.
pub mod codes {
    pub const USER_REJECTED: i32 = 4001;
    pub const UNAUTHORIZED: i32 = 4100;
    pub const RESOURCE_UNAVAILABLE: i32 = -32002;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL: i32 = -32000;
}

/// Errors that can occur while handling a page request.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The user rejected the request.
    #[error("user rejected the request")]
    UserRejected,

    /// The origin has no connection for this capability.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The wallet stayed locked past the unlock timeout.
    #[error("wallet unlock timeout")]
    UnlockTimeout,

    /// Nobody resolved the request before the approval timeout.
    #[error("approval timeout")]
    ApprovalTimeout,

    /// The session expired or was locked mid-request.
    #[error("session expired")]
    SessionExpired,

    /// Known method that is always refused.
    #[error("{method} is not supported: {reason}")]
    MethodNotSupported { method: String, reason: &'static str },

    /// Unknown method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Malformed request parameters.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Vault error.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// The provider error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::UserRejected => codes::USER_REJECTED,
            BridgeError::Unauthorized(_) => codes::UNAUTHORIZED,
            BridgeError::UnlockTimeout
            | BridgeError::ApprovalTimeout
            | BridgeError::SessionExpired => codes::RESOURCE_UNAVAILABLE,
            BridgeError::MethodNotSupported { .. } | BridgeError::MethodNotFound(_) => {
                codes::METHOD_NOT_FOUND
            }
            BridgeError::InvalidParams(_) => codes::INVALID_PARAMS,
            BridgeError::Vault(e) if e.is_crypto() => codes::RESOURCE_UNAVAILABLE,
            BridgeError::Vault(VaultError::SessionExpired) => codes::RESOURCE_UNAVAILABLE,
            BridgeError::Vault(VaultError::Store(_)) | BridgeError::Store(_) => {
                codes::RESOURCE_UNAVAILABLE
            }
            BridgeError::Vault(_) | BridgeError::Internal(_) => codes::INTERNAL,
        }
    }

    /// The page-visible error. Internal detail is never included.
    pub fn to_provider_error(&self) -> ProviderError {
        let message = match self {
            BridgeError::UserRejected => "User rejected the request.".to_string(),
            BridgeError::Unauthorized(_) => {
                "The requested account and/or method has not been authorized by the user."
                    .to_string()
            }
            BridgeError::UnlockTimeout => "wallet unlock timeout".to_string(),
            BridgeError::ApprovalTimeout => "approval timeout".to_string(),
            BridgeError::SessionExpired => "session expired".to_string(),
            BridgeError::MethodNotSupported { method, reason } => {
                format!("{method} is not supported: {reason}")
            }
            BridgeError::MethodNotFound(method) => format!("method not found: {method}"),
            BridgeError::InvalidParams(detail) => format!("invalid params: {detail}"),
            BridgeError::Vault(e) if e.is_crypto() => "incorrect password".to_string(),
            BridgeError::Vault(VaultError::SessionExpired) => "session expired".to_string(),
            BridgeError::Vault(VaultError::Store(_)) | BridgeError::Store(_) => {
                "storage unavailable".to_string()
            }
            BridgeError::Vault(_) | BridgeError::Internal(_) => "Internal error".to_string(),
        };
        ProviderError {
            code: self.code(),
            message,
        }
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
