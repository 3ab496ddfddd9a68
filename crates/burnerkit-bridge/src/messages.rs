//! Bridge protocol message types.
//!
//! Two layers:
//! - [`RpcRequest`] / [`RpcResponse`]: the EIP-1193-shaped envelope a page sends.
//! - [`ExtensionMessage`] / [`ExtensionReply`]: the tagged union exchanged
//!   between the page relay, the approval UI and the bridge worker. Every
//!   message carries a [`CorrelationId`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroize;

use burnerkit_core::NetworkFamily;

use crate::queue::{PendingRequest, RequestId, ResolveOutcome};

/// A page request: `{ id, method, params }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// `{ code, message }` as seen by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub code: i32,
    pub message: String,
}

/// Either a result or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcOutcome {
    Result(Value),
    Error(ProviderError),
}

/// A page response: `{ id, result }` or `{ id, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(flatten)]
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    pub fn result(id: u64, value: Value) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Result(value),
        }
    }

    pub fn error(id: u64, error: ProviderError) -> Self {
        Self {
            id,
            outcome: RpcOutcome::Error(error),
        }
    }

    pub fn as_result(&self) -> Option<&Value> {
        match &self.outcome {
            RpcOutcome::Result(value) => Some(value),
            RpcOutcome::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ProviderError> {
        match &self.outcome {
            RpcOutcome::Result(_) => None,
            RpcOutcome::Error(error) => Some(error),
        }
    }
}

/// How the bridge treats a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Answered from connected-site state, no prompt.
    Public,
    /// Needs an approved connection.
    Connect,
    /// Needs an approved signature.
    Sign,
    /// Always refused.
    Rejected,
}

/// Every method name the bridge recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    EthChainId,
    NetVersion,
    EthAccounts,
    GetAccount,
    Disconnect,
    RevokePermissions,
    EthRequestAccounts,
    Connect,
    RequestPermissions,
    PersonalSign,
    SignMessage,
    EthSendTransaction,
    EthSignTransaction,
    SignTransaction,
    SignAllTransactions,
    EthSignTypedData,
    EthSignTypedDataV3,
    EthSignTypedDataV4,
    EthSign,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        let method = match name {
            "eth_chainId" => Method::EthChainId,
            "net_version" => Method::NetVersion,
            "eth_accounts" => Method::EthAccounts,
            "getAccount" => Method::GetAccount,
            "disconnect" => Method::Disconnect,
            "wallet_revokePermissions" => Method::RevokePermissions,
            "eth_requestAccounts" => Method::EthRequestAccounts,
            "connect" => Method::Connect,
            "wallet_requestPermissions" => Method::RequestPermissions,
            "personal_sign" => Method::PersonalSign,
            "signMessage" => Method::SignMessage,
            "eth_sendTransaction" => Method::EthSendTransaction,
            "eth_signTransaction" => Method::EthSignTransaction,
            "signTransaction" => Method::SignTransaction,
            "signAllTransactions" => Method::SignAllTransactions,
            "eth_signTypedData" => Method::EthSignTypedData,
            "eth_signTypedData_v3" => Method::EthSignTypedDataV3,
            "eth_signTypedData_v4" => Method::EthSignTypedDataV4,
            "eth_sign" => Method::EthSign,
            _ => return None,
        };
        Some(method)
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::EthChainId => "eth_chainId",
            Method::NetVersion => "net_version",
            Method::EthAccounts => "eth_accounts",
            Method::GetAccount => "getAccount",
            Method::Disconnect => "disconnect",
            Method::RevokePermissions => "wallet_revokePermissions",
            Method::EthRequestAccounts => "eth_requestAccounts",
            Method::Connect => "connect",
            Method::RequestPermissions => "wallet_requestPermissions",
            Method::PersonalSign => "personal_sign",
            Method::SignMessage => "signMessage",
            Method::EthSendTransaction => "eth_sendTransaction",
            Method::EthSignTransaction => "eth_signTransaction",
            Method::SignTransaction => "signTransaction",
            Method::SignAllTransactions => "signAllTransactions",
            Method::EthSignTypedData => "eth_signTypedData",
            Method::EthSignTypedDataV3 => "eth_signTypedData_v3",
            Method::EthSignTypedDataV4 => "eth_signTypedData_v4",
            Method::EthSign => "eth_sign",
        }
    }

    pub fn class(self) -> MethodClass {
        match self {
            Method::EthChainId
            | Method::NetVersion
            | Method::EthAccounts
            | Method::GetAccount
            | Method::Disconnect
            | Method::RevokePermissions => MethodClass::Public,
            Method::EthRequestAccounts | Method::Connect | Method::RequestPermissions => {
                MethodClass::Connect
            }
            Method::PersonalSign | Method::SignMessage => MethodClass::Sign,
            Method::EthSendTransaction
            | Method::EthSignTransaction
            | Method::SignTransaction
            | Method::SignAllTransactions
            | Method::EthSignTypedData
            | Method::EthSignTypedDataV3
            | Method::EthSignTypedDataV4
            | Method::EthSign => MethodClass::Rejected,
        }
    }

    /// Which provider the method belongs to.
    pub fn family(self) -> NetworkFamily {
        match self {
            Method::GetAccount
            | Method::Disconnect
            | Method::Connect
            | Method::SignMessage
            | Method::SignTransaction
            | Method::SignAllTransactions => NetworkFamily::Solana,
            _ => NetworkFamily::Evm,
        }
    }

    /// Explanation returned for always-refused methods.
    pub fn rejection_reason(self) -> Option<&'static str> {
        match self {
            Method::EthSendTransaction
            | Method::EthSignTransaction
            | Method::SignTransaction
            | Method::SignAllTransactions => {
                Some("burner wallets do not sign transactions for pages; send from the wallet UI")
            }
            Method::EthSignTypedData | Method::EthSignTypedDataV3 | Method::EthSignTypedDataV4 => {
                Some("typed-data signing is not implemented")
            }
            Method::EthSign => Some("raw hash signing is unsafe and disabled; use personal_sign"),
            _ => None,
        }
    }
}

/// Correlates an [`ExtensionMessage`] with its [`ExtensionReply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

/// A password in transit from the unlock UI. Redacted in `Debug`, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Messages into the bridge worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtensionMessage {
    /// A page request relayed from a content script.
    PageRequest {
        correlation_id: CorrelationId,
        origin: String,
        request: RpcRequest,
    },
    /// The approval UI's decision on a pending request.
    ApprovalDecision {
        correlation_id: CorrelationId,
        request_id: RequestId,
        approved: bool,
        #[serde(default)]
        public_key: Option<String>,
    },
    /// Unlock with a password.
    Unlock {
        correlation_id: CorrelationId,
        password: Password,
    },
    /// Lock now.
    Lock { correlation_id: CorrelationId },
    /// List requests awaiting a decision.
    ListPending { correlation_id: CorrelationId },
}

impl ExtensionMessage {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            ExtensionMessage::PageRequest { correlation_id, .. }
            | ExtensionMessage::ApprovalDecision { correlation_id, .. }
            | ExtensionMessage::Unlock { correlation_id, .. }
            | ExtensionMessage::Lock { correlation_id }
            | ExtensionMessage::ListPending { correlation_id } => *correlation_id,
        }
    }
}

/// Replies out of the bridge worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtensionReply {
    PageResponse {
        correlation_id: CorrelationId,
        response: RpcResponse,
    },
    DecisionRecorded {
        correlation_id: CorrelationId,
        outcome: ResolveOutcome,
    },
    Unlocked {
        correlation_id: CorrelationId,
        expires_at: i64,
    },
    Locked { correlation_id: CorrelationId },
    Pending {
        correlation_id: CorrelationId,
        requests: Vec<PendingRequest>,
    },
    Error {
        correlation_id: CorrelationId,
        error: ProviderError,
    },
}

impl ExtensionReply {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            ExtensionReply::PageResponse { correlation_id, .. }
            | ExtensionReply::DecisionRecorded { correlation_id, .. }
            | ExtensionReply::Unlocked { correlation_id, .. }
            | ExtensionReply::Locked { correlation_id }
            | ExtensionReply::Pending { correlation_id, .. }
            | ExtensionReply::Error { correlation_id, .. } => *correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_shape() {
        let ok = RpcResponse::result(7, json!("0x1"));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"id": 7, "result": "0x1"}));

        let err = RpcResponse::error(
            8,
            ProviderError {
                code: 4001,
                message: "User rejected the request.".into(),
            },
        );
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"id": 8, "error": {"code": 4001, "message": "User rejected the request."}})
        );
    }

    #[test]
    fn test_request_params_default() {
        let request: RpcRequest =
            serde_json::from_value(json!({"id": 1, "method": "eth_chainId"})).unwrap();
        assert!(request.params.is_empty());
    }

    #[test]
    fn test_method_names_roundtrip() {
        for name in [
            "eth_chainId",
            "personal_sign",
            "signMessage",
            "eth_signTypedData_v4",
            "wallet_revokePermissions",
        ] {
            assert_eq!(Method::from_name(name).unwrap().name(), name);
        }
        assert!(Method::from_name("eth_getBalance").is_none());
    }

    #[test]
    fn test_rejected_methods_explain_themselves() {
        for method in [Method::EthSendTransaction, Method::EthSign, Method::EthSignTypedData] {
            assert_eq!(method.class(), MethodClass::Rejected);
            assert!(method.rejection_reason().is_some());
        }
        assert!(Method::PersonalSign.rejection_reason().is_none());
    }

    #[test]
    fn test_extension_message_tagging() {
        let message: ExtensionMessage = serde_json::from_value(json!({
            "type": "unlock",
            "correlation_id": 3,
            "password": "pw",
        }))
        .unwrap();
        assert_eq!(message.correlation_id(), CorrelationId(3));
        assert!(!format!("{message:?}").contains("pw\""));
    }
}
