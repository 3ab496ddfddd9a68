//! # Burnerkit Bridge
//!
//! Mediates every page request that would connect to or sign with a burner.
//!
//! ## Overview
//!
//! Pages speak an EIP-1193-shaped protocol (`{ id, method, params }` in,
//! `{ id, result } | { id, error: { code, message } }` out). Public methods are
//! answered from connected-site state. Connect and sign requests wait for an
//! unlocked session, then for an explicit user decision, and only then touch
//! key material.
//!
//! ## Key Types
//!
//! - [`ApprovalBridge`] - The per-request state machine
//! - [`ApprovalQueue`] - Pending requests and their at-most-once resolutions
//! - [`SiteRegistry`] - Origin to burner bindings
//! - [`BridgeWorker`] / [`BridgeHandle`] - Channel-fed event loop
//! - [`ExtensionMessage`] / [`ExtensionReply`] - Tagged, correlated messages
//!
//! ## Message Flow
//!
//! ```text
//! Page          Bridge                 Session        Queue         UI
//!   |-- request -->|                       |             |            |
//!   |              |-- valid? ------------>|             |            |
//!   |              |-- Prompt::Unlock -------------------------------->|
//!   |              |<-- unlocked ----------|             |            |
//!   |              |-- enqueue ------------------------->|            |
//!   |              |-- Prompt::Approve ------------------------------->|
//!   |              |                       |             |<- resolve -|
//!   |              |<-- dequeue -------------------------|            |
//!   |<- response --|                       |             |            |
//! ```

pub mod bridge;
pub mod error;
pub mod messages;
pub mod queue;
pub mod sites;
pub mod worker;

pub use bridge::{ApprovalBridge, BridgeConfig, NoopPopup, PopupOpener, Prompt};
pub use error::{codes, BridgeError, Result};
pub use messages::{
    CorrelationId, ExtensionMessage, ExtensionReply, Method, MethodClass, Password,
    ProviderError, RpcOutcome, RpcRequest, RpcResponse,
};
pub use queue::{
    ApprovalQueue, ApprovalResult, PendingPayload, PendingRequest, RequestId, ResolveOutcome,
    WaitOutcome,
};
pub use sites::{normalize_origin, ConnectedSite, SiteRegistry};
pub use worker::{BridgeHandle, BridgeWorker};
