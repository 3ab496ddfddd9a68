//! Event-driven bridge worker.
//!
//! Messages arrive over an mpsc channel. Each one is handled on its own task,
//! so a request parked in an unlock or approval wait never blocks the
//! messages that would resolve it.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use burnerkit_store::KvStore;

use crate::bridge::ApprovalBridge;
use crate::error::{BridgeError, Result};
use crate::messages::{ExtensionMessage, ExtensionReply};

/// Message plus the slot its reply goes into.
struct Envelope {
    message: ExtensionMessage,
    reply: oneshot::Sender<ExtensionReply>,
}

/// Cloneable sender side of a [`BridgeWorker`].
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<Envelope>,
}

impl BridgeHandle {
    /// Send a message and wait for its reply.
    pub async fn send(&self, message: ExtensionMessage) -> Result<ExtensionReply> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| BridgeError::Internal("bridge worker stopped".into()))?;
        rx.await
            .map_err(|_| BridgeError::Internal("reply dropped".into()))
    }

    /// Whether the worker is still accepting messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receives [`ExtensionMessage`]s and dispatches them to the bridge.
pub struct BridgeWorker<S: KvStore> {
    bridge: Arc<ApprovalBridge<S>>,
    rx: mpsc::Receiver<Envelope>,
}

impl<S: KvStore + 'static> BridgeWorker<S> {
    /// Create a worker and the handle that feeds it.
    pub fn new(bridge: Arc<ApprovalBridge<S>>, capacity: usize) -> (Self, BridgeHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { bridge, rx }, BridgeHandle { tx })
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        info!("bridge worker started");
        while let Some(Envelope { message, reply }) = self.rx.recv().await {
            let bridge = self.bridge.clone();
            tokio::spawn(async move {
                let correlation_id = message.correlation_id();
                let response = bridge.dispatch(message).await;
                if reply.send(response).is_err() {
                    debug!(?correlation_id, "caller went away before reply");
                }
            });
        }
        info!("bridge worker stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use burnerkit_core::{ManualClock, Network};
    use burnerkit_store::MemoryStore;
    use burnerkit_vault::{SecretHolder, SessionConfig, SessionManager, Vault, VaultConfig};

    use crate::bridge::{BridgeConfig, NoopPopup};
    use crate::messages::{CorrelationId, Password, RpcRequest};

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    async fn worker() -> (BridgeWorker<MemoryStore>, BridgeHandle) {
        let clock = Arc::new(ManualClock::new(0));
        let vault = Arc::new(Vault::new(
            Arc::new(MemoryStore::new()),
            VaultConfig {
                kdf_iterations: 1_000,
                ..VaultConfig::default()
            },
            clock.clone(),
        ));
        vault.create_from_mnemonic("pw", ABANDON).await.unwrap();
        vault.generate_burner("pw", Network::Ethereum).await.unwrap();
        let session = Arc::new(SessionManager::new(
            vault.clone(),
            Arc::new(SecretHolder::new()),
            clock.clone(),
            SessionConfig::default(),
        ));
        let bridge = Arc::new(ApprovalBridge::new(
            vault,
            session,
            Arc::new(NoopPopup),
            clock,
            BridgeConfig {
                poll_interval: Duration::from_millis(10),
                ..BridgeConfig::default()
            },
        ));
        BridgeWorker::new(bridge, 16)
    }

    #[tokio::test]
    async fn test_replies_carry_correlation_id() {
        let (worker, handle) = worker().await;
        let task = worker.spawn();

        let reply = handle
            .send(ExtensionMessage::PageRequest {
                correlation_id: CorrelationId(5),
                origin: "https://app.example".into(),
                request: RpcRequest::new(1, "eth_chainId", vec![]),
            })
            .await
            .unwrap();
        assert_eq!(reply.correlation_id(), CorrelationId(5));

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_waiting_request_does_not_block_worker() {
        let (worker, handle) = worker().await;
        let task = worker.spawn();

        // Parks in the unlock wait.
        let parked = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .send(ExtensionMessage::PageRequest {
                        correlation_id: CorrelationId(1),
                        origin: "https://app.example".into(),
                        request: RpcRequest::new(1, "eth_requestAccounts", vec![]),
                    })
                    .await
            })
        };

        let reply = handle
            .send(ExtensionMessage::Unlock {
                correlation_id: CorrelationId(2),
                password: Password::new("pw"),
            })
            .await
            .unwrap();
        assert!(matches!(reply, ExtensionReply::Unlocked { .. }));

        // The parked request is now waiting for approval.
        let request_id = loop {
            let reply = handle
                .send(ExtensionMessage::ListPending {
                    correlation_id: CorrelationId(3),
                })
                .await
                .unwrap();
            if let ExtensionReply::Pending { requests, .. } = reply {
                if let Some(request) = requests.into_iter().next() {
                    break request.id;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        handle
            .send(ExtensionMessage::ApprovalDecision {
                correlation_id: CorrelationId(4),
                request_id,
                approved: true,
                public_key: None,
            })
            .await
            .unwrap();

        let reply = parked.await.unwrap().unwrap();
        match reply {
            ExtensionReply::PageResponse { response, .. } => {
                assert!(response.as_result().is_some());
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        drop(handle);
        task.await.unwrap();
    }
}
