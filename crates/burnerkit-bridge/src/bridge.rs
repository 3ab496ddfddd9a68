//! The approval bridge state machine.
//!
//! Per request: `Received -> AwaitingUnlock -> AwaitingApproval ->
//! {Approved, Rejected, TimedOut}`. Public methods answer from connected-site
//! state. Connect and sign requests wait for an unlocked session, then for an
//! explicit decision in the approval queue. Key material is only resolved
//! after approval.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use burnerkit_core::{BurnerWallet, Clock, Identity, Network, NetworkFamily};
use burnerkit_store::KvStore;
use burnerkit_vault::{SessionManager, Vault, VaultError};

use crate::error::{codes, BridgeError, Result};
use crate::messages::{
    ExtensionMessage, ExtensionReply, Method, MethodClass, RpcRequest, RpcResponse,
};
use crate::queue::{ApprovalQueue, ApprovalResult, PendingPayload, RequestId, WaitOutcome};
use crate::sites::{normalize_origin, ConnectedSite, SiteRegistry};

/// Configuration for the bridge's waits.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Fallback poll tick for both waits.
    pub poll_interval: Duration,
    /// How long a request waits for the wallet to be unlocked.
    pub unlock_timeout: Duration,
    /// How long a request waits for a decision.
    pub approval_timeout: Duration,
    /// Network reported to EVM pages with no connection yet.
    pub default_evm_network: Network,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            unlock_timeout: Duration::from_secs(60),
            approval_timeout: Duration::from_secs(60),
            default_evm_network: Network::Ethereum,
        }
    }
}

/// What the host should show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Unlock { origin: String },
    Approve { request_id: RequestId, origin: String },
}

/// The host environment's popup capability.
#[async_trait]
pub trait PopupOpener: Send + Sync {
    async fn open(&self, prompt: Prompt) -> Result<()>;
}

/// Opens nothing. For hosts whose UI polls `list_pending` on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPopup;

#[async_trait]
impl PopupOpener for NoopPopup {
    async fn open(&self, _prompt: Prompt) -> Result<()> {
        Ok(())
    }
}

/// Mediates between page requests and the user's consent.
pub struct ApprovalBridge<S: KvStore> {
    vault: Arc<Vault<S>>,
    session: Arc<SessionManager<S>>,
    queue: ApprovalQueue<S>,
    sites: SiteRegistry<S>,
    popup: Arc<dyn PopupOpener>,
    config: BridgeConfig,
    /// One async mutex per origin for connect de-duplication.
    origin_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: KvStore> ApprovalBridge<S> {
    pub fn new(
        vault: Arc<Vault<S>>,
        session: Arc<SessionManager<S>>,
        popup: Arc<dyn PopupOpener>,
        clock: Arc<dyn Clock>,
        config: BridgeConfig,
    ) -> Self {
        let store = vault.store().clone();
        Self {
            queue: ApprovalQueue::new(store.clone(), clock.clone()),
            sites: SiteRegistry::new(store, clock),
            vault,
            session,
            popup,
            config,
            origin_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn vault(&self) -> &Arc<Vault<S>> {
        &self.vault
    }

    pub fn session(&self) -> &Arc<SessionManager<S>> {
        &self.session
    }

    pub fn queue(&self) -> &ApprovalQueue<S> {
        &self.queue
    }

    pub fn sites(&self) -> &SiteRegistry<S> {
        &self.sites
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry Points
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle one extension message. Every message gets exactly one reply.
    pub async fn dispatch(&self, message: ExtensionMessage) -> ExtensionReply {
        let correlation_id = message.correlation_id();
        let reply = match message {
            ExtensionMessage::PageRequest { origin, request, .. } => Ok(ExtensionReply::PageResponse {
                correlation_id,
                response: self.handle(&origin, request).await,
            }),
            ExtensionMessage::ApprovalDecision {
                request_id,
                approved,
                public_key,
                ..
            } => self
                .queue
                .resolve(&request_id, approved, public_key)
                .await
                .map(|outcome| ExtensionReply::DecisionRecorded {
                    correlation_id,
                    outcome,
                }),
            ExtensionMessage::Unlock { password, .. } => self
                .session
                .unlock(password.expose())
                .await
                .map(|expires_at| ExtensionReply::Unlocked {
                    correlation_id,
                    expires_at,
                })
                .map_err(BridgeError::from),
            ExtensionMessage::Lock { .. } => self
                .session
                .lock()
                .await
                .map(|()| ExtensionReply::Locked { correlation_id })
                .map_err(BridgeError::from),
            ExtensionMessage::ListPending { .. } => {
                self.queue
                    .list_pending()
                    .await
                    .map(|requests| ExtensionReply::Pending {
                        correlation_id,
                        requests,
                    })
            }
        };
        reply.unwrap_or_else(|e| ExtensionReply::Error {
            correlation_id,
            error: e.to_provider_error(),
        })
    }

    /// Answer a page request. Errors become provider errors.
    pub async fn handle(&self, origin: &str, request: RpcRequest) -> RpcResponse {
        let id = request.id;
        match self.route(origin, &request).await {
            Ok(value) => RpcResponse::result(id, value),
            Err(e) => {
                if e.code() == codes::INTERNAL {
                    warn!(origin, method = %request.method, error = %e, "request failed");
                } else {
                    debug!(origin, method = %request.method, error = %e, "request refused");
                }
                RpcResponse::error(id, e.to_provider_error())
            }
        }
    }

    async fn route(&self, origin: &str, request: &RpcRequest) -> Result<Value> {
        let method = Method::from_name(&request.method)
            .ok_or_else(|| BridgeError::MethodNotFound(request.method.clone()))?;
        let origin = normalize_origin(origin)?;
        match method.class() {
            MethodClass::Rejected => Err(BridgeError::MethodNotSupported {
                method: method.name().to_string(),
                reason: method.rejection_reason().unwrap_or("refused"),
            }),
            MethodClass::Public => self.handle_public(&origin, method).await,
            MethodClass::Connect => self.handle_connect(&origin, method).await,
            MethodClass::Sign => self.handle_sign(&origin, method, &request.params).await,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Public Methods
    // ─────────────────────────────────────────────────────────────────────────

    async fn handle_public(&self, origin: &str, method: Method) -> Result<Value> {
        let site = self.sites.get(origin).await?;
        let evm_site = site.as_ref().filter(|s| s.family() == NetworkFamily::Evm);
        let solana_site = site.as_ref().filter(|s| s.family() == NetworkFamily::Solana);

        let value = match method {
            Method::EthChainId | Method::NetVersion => {
                let network = evm_site.map_or(self.config.default_evm_network, |s| s.network);
                let chain_id = network
                    .chain_id()
                    .ok_or_else(|| BridgeError::Internal(format!("{network} has no chain id")))?;
                if method == Method::EthChainId {
                    json!(format!("{chain_id:#x}"))
                } else {
                    json!(chain_id.to_string())
                }
            }
            Method::EthAccounts => json!(evm_site.map(|s| vec![s.address.clone()]).unwrap_or_default()),
            Method::GetAccount => match solana_site {
                Some(site) => json!({ "publicKey": site.address }),
                None => Value::Null,
            },
            Method::Disconnect | Method::RevokePermissions => {
                self.sites.disconnect(origin).await?;
                Value::Null
            }
            other => return Err(BridgeError::MethodNotFound(other.name().to_string())),
        };
        Ok(value)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connect
    // ─────────────────────────────────────────────────────────────────────────

    fn origin_lock(&self, origin: &str) -> Arc<Mutex<()>> {
        self.origin_locks
            .lock()
            .unwrap()
            .entry(origin.to_string())
            .or_default()
            .clone()
    }

    /// Drop the origin's entry once no other connect holds or awaits it.
    fn release_origin_lock(&self, origin: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.origin_locks.lock().unwrap();
        let idle = locks
            .get(origin)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(origin);
        }
    }

    async fn handle_connect(&self, origin: &str, method: Method) -> Result<Value> {
        let lock = self.origin_lock(origin);
        let result = {
            let _guard = lock.lock().await;
            self.connect_serialized(origin, method).await
        };
        self.release_origin_lock(origin, lock);
        result
    }

    async fn connect_serialized(&self, origin: &str, method: Method) -> Result<Value> {
        let family = method.family();
        self.await_unlock(origin).await?;

        if let Some(site) = self.sites.get(origin).await? {
            if site.family() == family {
                debug!(origin, "already connected");
                return Ok(connect_response(method, &site));
            }
        }

        let network = match family {
            NetworkFamily::Solana => Network::Solana,
            NetworkFamily::Evm => self.config.default_evm_network,
        };
        let result = self
            .request_approval(origin, PendingPayload::Connect { network })
            .await?;
        let burner = self
            .approved_burner(network, result.public_key.as_deref())
            .await?;
        let site = self
            .sites
            .connect(origin, network, burner.index, &burner.address)
            .await?;
        Ok(connect_response(method, &site))
    }

    /// The burner the user approved, or the active one, or a fresh one.
    async fn approved_burner(&self, network: Network, public_key: Option<&str>) -> Result<BurnerWallet> {
        let family = network.family();
        if let Some(address) = public_key {
            return self
                .vault
                .find_burner_by_address(address)
                .await?
                .filter(|b| b.network == family && !b.archived)
                .ok_or_else(|| {
                    BridgeError::Internal(format!("approved address is not a live {family} burner"))
                });
        }
        if let Some(active) = self.vault.active_burner(family).await? {
            return Ok(active);
        }
        let password = self.session.password().await?;
        let (burner, _) = self.vault.generate_burner(&password, network).await?;
        Ok(burner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sign
    // ─────────────────────────────────────────────────────────────────────────

    async fn handle_sign(&self, origin: &str, method: Method, params: &[Value]) -> Result<Value> {
        let site = self
            .sites
            .get(origin)
            .await?
            .filter(|s| s.family() == method.family())
            .ok_or_else(|| BridgeError::Unauthorized(origin.to_string()))?;

        let message = match method {
            Method::PersonalSign => parse_personal_sign(params, &site)?,
            _ => parse_sign_message(params)?,
        };

        self.await_unlock(origin).await?;
        self.request_approval(
            origin,
            PendingPayload::SignMessage {
                network: site.network,
                index: site.burner_index,
                address: site.address.clone(),
                message: message.clone(),
            },
        )
        .await?;

        let identity = self.signing_identity(&site).await?;
        let signature = identity.sign_message(&message);
        info!(origin, network = %site.network, index = site.burner_index, "message signed");

        Ok(match identity {
            Identity::Evm(_) => json!(format!("0x{}", hex::encode(signature))),
            Identity::Solana(_) => json!({
                "signature": bs58::encode(signature).into_string(),
                "publicKey": site.address,
            }),
        })
    }

    /// Resolve the site's burner. Decrypt or integrity failures lock the session.
    async fn signing_identity(&self, site: &ConnectedSite) -> Result<Identity> {
        let password = self.session.password().await?;
        let resolved = self
            .vault
            .resolve_keypair(&password, site.network, site.burner_index)
            .await
            .and_then(|identity| {
                identity
                    .verify_address(&site.address, site.burner_index)
                    .map_err(VaultError::from)?;
                Ok(identity)
            });
        match resolved {
            Ok(identity) => Ok(identity),
            Err(e) => {
                if e.is_crypto() || e.is_integrity() {
                    warn!(origin = %site.domain, error = %e, "signing key unavailable, locking session");
                    self.session.lock().await?;
                }
                Err(e.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Waits
    // ─────────────────────────────────────────────────────────────────────────

    /// Block this request until the session is valid or the unlock timeout.
    async fn await_unlock(&self, origin: &str) -> Result<()> {
        if self.session.check_liveness().await? {
            return Ok(());
        }
        let mut state = self.session.subscribe();
        let mut watch_open = true;
        self.popup
            .open(Prompt::Unlock {
                origin: origin.to_string(),
            })
            .await?;
        debug!(origin, "awaiting unlock");

        let poll = self.config.poll_interval;
        let deadline = tokio::time::sleep(self.config.unlock_timeout);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + poll, poll);

        loop {
            if self.session.is_session_valid() {
                return Ok(());
            }
            tokio::select! {
                _ = &mut deadline => {
                    info!(origin, "unlock timed out");
                    return Err(BridgeError::UnlockTimeout);
                }
                changed = state.changed(), if watch_open => {
                    if changed.is_err() {
                        watch_open = false;
                    }
                }
                _ = ticker.tick() => {}
            }
        }
    }

    /// Enqueue, prompt, and wait for a decision.
    async fn request_approval(&self, origin: &str, payload: PendingPayload) -> Result<ApprovalResult> {
        let request = self.queue.enqueue(origin, payload).await?;
        let prompt = Prompt::Approve {
            request_id: request.id.clone(),
            origin: origin.to_string(),
        };
        if let Err(e) = self.popup.open(prompt).await {
            self.queue.cancel(&request.id).await?;
            return Err(e);
        }

        let outcome = self
            .queue
            .wait_for_resolution(
                &request.id,
                self.config.approval_timeout,
                self.config.poll_interval,
            )
            .await?;
        match outcome {
            WaitOutcome::Resolved(result) if result.approved => {
                info!(origin, request_id = %request.id, "request approved");
                Ok(result)
            }
            WaitOutcome::Resolved(_) => {
                info!(origin, request_id = %request.id, "request rejected");
                Err(BridgeError::UserRejected)
            }
            WaitOutcome::TimedOut => Err(BridgeError::ApprovalTimeout),
        }
    }
}

fn connect_response(method: Method, site: &ConnectedSite) -> Value {
    match method {
        Method::Connect => json!({ "publicKey": site.address }),
        Method::RequestPermissions => json!([{ "parentCapability": "eth_accounts" }]),
        _ => json!([site.address]),
    }
}

fn param_str<'a>(params: &'a [Value], position: usize) -> Result<&'a str> {
    params
        .get(position)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::InvalidParams(format!("expected a string at position {position}")))
}

/// `personal_sign(message, address)`. Some pages send the pair reversed.
fn parse_personal_sign(params: &[Value], site: &ConnectedSite) -> Result<Vec<u8>> {
    let first = param_str(params, 0)?;
    let second = param_str(params, 1)?;
    let (message, address) = if first.eq_ignore_ascii_case(&site.address)
        && !second.eq_ignore_ascii_case(&site.address)
    {
        (second, first)
    } else {
        (first, second)
    };
    if !address.eq_ignore_ascii_case(&site.address) {
        return Err(BridgeError::Unauthorized(format!(
            "{address} is not connected to {}",
            site.domain
        )));
    }
    Ok(decode_message(message))
}

/// A `0x` hex string is raw bytes; anything else is UTF-8 text.
fn decode_message(message: &str) -> Vec<u8> {
    message
        .strip_prefix("0x")
        .and_then(|body| hex::decode(body).ok())
        .unwrap_or_else(|| message.as_bytes().to_vec())
}

/// `signMessage(message)` with a UTF-8 string or a byte array.
fn parse_sign_message(params: &[Value]) -> Result<Vec<u8>> {
    match params.first() {
        Some(Value::String(text)) => Ok(text.as_bytes().to_vec()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| BridgeError::InvalidParams("message bytes must be 0..=255".into()))
            })
            .collect(),
        _ => Err(BridgeError::InvalidParams(
            "expected a message string or byte array".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnerkit_core::{keyspace, ManualClock};
    use burnerkit_store::{MemoryStore, StoreExt};
    use burnerkit_vault::{SecretHolder, SessionConfig, VaultConfig};
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";
    const ORIGIN: &str = "https://app.example";
    const ETH_0: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

    struct ChannelPopup(mpsc::UnboundedSender<Prompt>);

    #[async_trait]
    impl PopupOpener for ChannelPopup {
        async fn open(&self, prompt: Prompt) -> Result<()> {
            let _ = self.0.send(prompt);
            Ok(())
        }
    }

    struct Harness {
        bridge: Arc<ApprovalBridge<MemoryStore>>,
        prompts: mpsc::UnboundedReceiver<Prompt>,
    }

    fn fast_config() -> BridgeConfig {
        BridgeConfig {
            poll_interval: Duration::from_millis(10),
            unlock_timeout: Duration::from_secs(2),
            approval_timeout: Duration::from_secs(2),
            ..BridgeConfig::default()
        }
    }

    async fn harness(config: BridgeConfig, unlocked: bool) -> Harness {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let clock = ManualClock::new(1_700_000_000_000);
        let vault = Arc::new(Vault::new(
            Arc::new(MemoryStore::new()),
            VaultConfig {
                kdf_iterations: 1_000,
                ..VaultConfig::default()
            },
            Arc::new(clock.clone()),
        ));
        vault.create_from_mnemonic("pw", ABANDON).await.unwrap();
        vault.generate_burner("pw", Network::Ethereum).await.unwrap();
        vault.generate_burner("pw", Network::Solana).await.unwrap();

        let session = Arc::new(SessionManager::new(
            vault.clone(),
            Arc::new(SecretHolder::new()),
            Arc::new(clock.clone()),
            SessionConfig::default(),
        ));
        if unlocked {
            session.unlock("pw").await.unwrap();
        }

        let (tx, prompts) = mpsc::unbounded_channel();
        let bridge = Arc::new(ApprovalBridge::new(
            vault,
            session,
            Arc::new(ChannelPopup(tx)),
            Arc::new(clock),
            config,
        ));
        Harness { bridge, prompts }
    }

    fn spawn_request(
        bridge: &Arc<ApprovalBridge<MemoryStore>>,
        method: &str,
        params: Vec<Value>,
    ) -> tokio::task::JoinHandle<RpcResponse> {
        let bridge = bridge.clone();
        let request = RpcRequest::new(1, method, params);
        tokio::spawn(async move { bridge.handle(ORIGIN, request).await })
    }

    async fn next_approval(prompts: &mut mpsc::UnboundedReceiver<Prompt>) -> RequestId {
        loop {
            let prompt = tokio::time::timeout(Duration::from_secs(2), prompts.recv())
                .await
                .unwrap()
                .unwrap();
            if let Prompt::Approve { request_id, .. } = prompt {
                return request_id;
            }
        }
    }

    async fn approve_next(h: &mut Harness, approved: bool) {
        let id = next_approval(&mut h.prompts).await;
        h.bridge.queue().resolve(&id, approved, None).await.unwrap();
    }

    async fn connect_evm(h: &mut Harness) -> RpcResponse {
        let task = spawn_request(&h.bridge, "eth_requestAccounts", vec![]);
        approve_next(h, true).await;
        task.await.unwrap()
    }

    #[tokio::test]
    async fn test_public_methods_answer_while_locked() {
        let h = harness(fast_config(), false).await;
        let chain = h.bridge.handle(ORIGIN, RpcRequest::new(1, "eth_chainId", vec![])).await;
        assert_eq!(chain.as_result(), Some(&json!("0x1")));
        let version = h.bridge.handle(ORIGIN, RpcRequest::new(2, "net_version", vec![])).await;
        assert_eq!(version.as_result(), Some(&json!("1")));
        let accounts = h.bridge.handle(ORIGIN, RpcRequest::new(3, "eth_accounts", vec![])).await;
        assert_eq!(accounts.as_result(), Some(&json!([])));
        let account = h.bridge.handle(ORIGIN, RpcRequest::new(4, "getAccount", vec![])).await;
        assert_eq!(account.as_result(), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_unknown_and_rejected_methods() {
        let h = harness(fast_config(), true).await;
        let unknown = h.bridge.handle(ORIGIN, RpcRequest::new(1, "eth_getBalance", vec![])).await;
        assert_eq!(unknown.as_error().unwrap().code, -32601);

        let refused = h
            .bridge
            .handle(ORIGIN, RpcRequest::new(2, "eth_sendTransaction", vec![]))
            .await;
        let error = refused.as_error().unwrap();
        assert_eq!(error.code, -32601);
        assert!(error.message.contains("not supported"));
    }

    #[tokio::test]
    async fn test_connect_approved_then_short_circuits() {
        let mut h = harness(fast_config(), true).await;
        let response = connect_evm(&mut h).await;
        assert_eq!(response.as_result(), Some(&json!([ETH_0])));

        let accounts = h.bridge.handle(ORIGIN, RpcRequest::new(2, "eth_accounts", vec![])).await;
        assert_eq!(accounts.as_result(), Some(&json!([ETH_0])));

        // No prompt is answered here; a second prompt would time out.
        let again = h
            .bridge
            .handle(ORIGIN, RpcRequest::new(3, "eth_requestAccounts", vec![]))
            .await;
        assert_eq!(again.as_result(), Some(&json!([ETH_0])));
        assert!(h.prompts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let mut h = harness(fast_config(), true).await;
        let task = spawn_request(&h.bridge, "eth_requestAccounts", vec![]);
        approve_next(&mut h, false).await;

        let response = task.await.unwrap();
        assert_eq!(response.as_error().unwrap().code, 4001);
        assert!(h.bridge.sites().get(ORIGIN).await.unwrap().is_none());
        assert!(h.bridge.queue().list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approval_timeout() {
        let config = BridgeConfig {
            approval_timeout: Duration::from_millis(50),
            ..fast_config()
        };
        let h = harness(config, true).await;
        let response = h
            .bridge
            .handle(ORIGIN, RpcRequest::new(1, "connect", vec![]))
            .await;
        assert_eq!(response.as_error().unwrap().code, -32002);
        assert!(h.bridge.queue().list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlock_timeout() {
        let config = BridgeConfig {
            unlock_timeout: Duration::from_millis(50),
            ..fast_config()
        };
        let mut h = harness(config, false).await;
        let response = h
            .bridge
            .handle(ORIGIN, RpcRequest::new(1, "eth_requestAccounts", vec![]))
            .await;
        let error = response.as_error().unwrap();
        assert_eq!(error.code, -32002);
        assert_eq!(error.message, "wallet unlock timeout");
        assert!(matches!(h.prompts.try_recv(), Ok(Prompt::Unlock { .. })));
    }

    #[tokio::test]
    async fn test_unlock_during_wait_continues() {
        let mut h = harness(fast_config(), false).await;
        let task = spawn_request(&h.bridge, "connect", vec![]);

        let prompt = tokio::time::timeout(Duration::from_secs(2), h.prompts.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            prompt,
            Prompt::Unlock {
                origin: ORIGIN.to_string()
            }
        );
        h.bridge.session().unlock("pw").await.unwrap();
        approve_next(&mut h, true).await;

        let response = task.await.unwrap();
        let solana = h
            .bridge
            .vault()
            .active_burner(NetworkFamily::Solana)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.as_result(), Some(&json!({ "publicKey": solana.address })));
    }

    #[tokio::test]
    async fn test_sign_requires_connection() {
        let h = harness(fast_config(), true).await;
        let response = h
            .bridge
            .handle(
                ORIGIN,
                RpcRequest::new(1, "personal_sign", vec![json!("0x68656c6c6f"), json!(ETH_0)]),
            )
            .await;
        assert_eq!(response.as_error().unwrap().code, 4100);
    }

    #[tokio::test]
    async fn test_personal_sign_after_approval() {
        let mut h = harness(fast_config(), true).await;
        connect_evm(&mut h).await;

        // Reversed parameter order is accepted.
        let task = spawn_request(&h.bridge, "personal_sign", vec![json!(ETH_0), json!("0x68656c6c6f")]);
        approve_next(&mut h, true).await;
        let response = task.await.unwrap();

        let identity = h
            .bridge
            .vault()
            .resolve_keypair("pw", Network::Ethereum, 0)
            .await
            .unwrap();
        let expected = format!("0x{}", hex::encode(identity.sign_message(b"hello")));
        assert_eq!(response.as_result(), Some(&json!(expected)));
    }

    #[tokio::test]
    async fn test_personal_sign_wrong_address_unauthorized() {
        let mut h = harness(fast_config(), true).await;
        connect_evm(&mut h).await;
        let response = h
            .bridge
            .handle(
                ORIGIN,
                RpcRequest::new(
                    2,
                    "personal_sign",
                    vec![json!("hi"), json!("0x0000000000000000000000000000000000000001")],
                ),
            )
            .await;
        assert_eq!(response.as_error().unwrap().code, 4100);
    }

    #[tokio::test]
    async fn test_solana_sign_message() {
        let mut h = harness(fast_config(), true).await;
        let task = spawn_request(&h.bridge, "connect", vec![]);
        approve_next(&mut h, true).await;
        task.await.unwrap();

        let task = spawn_request(&h.bridge, "signMessage", vec![json!([104, 105])]);
        approve_next(&mut h, true).await;
        let response = task.await.unwrap();

        let identity = h
            .bridge
            .vault()
            .resolve_keypair("pw", Network::Solana, 0)
            .await
            .unwrap();
        let result = response.as_result().unwrap();
        assert_eq!(
            result["signature"],
            json!(bs58::encode(identity.sign_message(b"hi")).into_string())
        );
        assert_eq!(result["publicKey"], json!(identity.address()));
    }

    #[tokio::test]
    async fn test_integrity_failure_locks_session() {
        let mut h = harness(fast_config(), true).await;
        connect_evm(&mut h).await;

        let store = h.bridge.vault().store().clone();
        let key = keyspace::burner(NetworkFamily::Evm, 0);
        let mut wallet: BurnerWallet = store.get_record(&key).await.unwrap().unwrap();
        wallet.address = "0x0000000000000000000000000000000000000002".into();
        store.put_record(&key, &wallet).await.unwrap();

        let task = spawn_request(&h.bridge, "personal_sign", vec![json!("hi"), json!(ETH_0)]);
        approve_next(&mut h, true).await;
        let response = task.await.unwrap();

        let error = response.as_error().unwrap();
        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "Internal error");
        assert!(h.bridge.session().state().is_locked());
    }

    #[tokio::test]
    async fn test_disconnect_removes_site() {
        let mut h = harness(fast_config(), true).await;
        connect_evm(&mut h).await;
        let response = h
            .bridge
            .handle(ORIGIN, RpcRequest::new(2, "wallet_revokePermissions", vec![]))
            .await;
        assert_eq!(response.as_result(), Some(&Value::Null));
        let accounts = h.bridge.handle(ORIGIN, RpcRequest::new(3, "eth_accounts", vec![])).await;
        assert_eq!(accounts.as_result(), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_concurrent_connects_prompt_once() {
        let mut h = harness(fast_config(), true).await;
        let first = spawn_request(&h.bridge, "eth_requestAccounts", vec![]);
        let second = spawn_request(&h.bridge, "eth_requestAccounts", vec![]);
        approve_next(&mut h, true).await;

        assert_eq!(first.await.unwrap().as_result(), Some(&json!([ETH_0])));
        assert_eq!(second.await.unwrap().as_result(), Some(&json!([ETH_0])));
        assert!(h.prompts.try_recv().is_err());
        assert!(h.bridge.origin_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_origin_locks_do_not_accumulate() {
        let mut h = harness(fast_config(), true).await;
        for i in 0..5 {
            let origin = format!("https://site{i}.example");
            let bridge = h.bridge.clone();
            let task = tokio::spawn(async move {
                bridge
                    .handle(&origin, RpcRequest::new(1, "eth_requestAccounts", vec![]))
                    .await
            });
            approve_next(&mut h, i % 2 == 0).await;
            task.await.unwrap();
        }
        assert!(h.bridge.origin_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_unlock_and_list_pending() {
        use crate::messages::{CorrelationId, Password};

        let h = harness(fast_config(), false).await;
        let reply = h
            .bridge
            .dispatch(ExtensionMessage::Unlock {
                correlation_id: CorrelationId(9),
                password: Password::new("nope"),
            })
            .await;
        match reply {
            ExtensionReply::Error { correlation_id, error } => {
                assert_eq!(correlation_id, CorrelationId(9));
                assert_eq!(error.message, "incorrect password");
            }
            other => panic!("unexpected reply: {other:?}"),
        }

        let reply = h
            .bridge
            .dispatch(ExtensionMessage::Unlock {
                correlation_id: CorrelationId(10),
                password: Password::new("pw"),
            })
            .await;
        assert!(matches!(reply, ExtensionReply::Unlocked { .. }));

        let reply = h
            .bridge
            .dispatch(ExtensionMessage::ListPending {
                correlation_id: CorrelationId(11),
            })
            .await;
        assert!(matches!(reply, ExtensionReply::Pending { ref requests, .. } if requests.is_empty()));
    }

    #[test]
    fn test_decode_message() {
        assert_eq!(decode_message("0x68656c6c6f"), b"hello");
        assert_eq!(decode_message("hello"), b"hello");
        assert_eq!(decode_message("0xzz"), b"0xzz");
    }

    proptest! {
        #[test]
        fn prop_sign_payloads_decode_to_their_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let hexed = format!("0x{}", hex::encode(&bytes));
            prop_assert_eq!(decode_message(&hexed), bytes.clone());

            let array = Value::Array(bytes.iter().map(|b| json!(b)).collect());
            prop_assert_eq!(parse_sign_message(&[array]).unwrap(), bytes);
        }

        #[test]
        fn prop_plain_text_is_utf8(text in "[^0].*") {
            prop_assert_eq!(decode_message(&text), text.as_bytes().to_vec());
        }
    }

    #[test]
    fn test_parse_sign_message_rejects_bad_bytes() {
        assert!(parse_sign_message(&[json!([1, 256])]).is_err());
        assert!(parse_sign_message(&[]).is_err());
        assert_eq!(parse_sign_message(&[json!("hi")]).unwrap(), b"hi");
    }
}
