//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an [`Extension`] over a
//! [`MemoryStore`], a manual clock, and a popup that records every prompt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use burnerkit::{Extension, ExtensionConfig};
use burnerkit_bridge::{BridgeConfig, PopupOpener, Prompt, RequestId, RpcRequest, RpcResponse};
use burnerkit_core::ManualClock;
use burnerkit_store::MemoryStore;
use burnerkit_vault::VaultConfig;

/// The BIP39 all-`abandon` test mnemonic.
pub const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

pub const TEST_PASSWORD: &str = "correct horse battery staple";

/// Start of the manual clock: 2023-11-14T22:13:20Z.
pub const EPOCH_MS: i64 = 1_700_000_000_000;

/// A config with cheap key stretching and short waits.
pub fn fast_config() -> ExtensionConfig {
    ExtensionConfig {
        vault: VaultConfig {
            kdf_iterations: 1_000,
            ..VaultConfig::default()
        },
        bridge: BridgeConfig {
            poll_interval: Duration::from_millis(10),
            unlock_timeout: Duration::from_secs(2),
            approval_timeout: Duration::from_secs(2),
            ..BridgeConfig::default()
        },
        ..ExtensionConfig::default()
    }
}

/// Popup that forwards every prompt to a channel.
pub struct RecordingPopup {
    tx: mpsc::UnboundedSender<Prompt>,
}

impl RecordingPopup {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Prompt>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PopupOpener for RecordingPopup {
    async fn open(&self, prompt: Prompt) -> burnerkit_bridge::Result<()> {
        let _ = self.tx.send(prompt);
        Ok(())
    }
}

/// A fully wired extension with a manual clock and recorded prompts.
pub struct TestFixture {
    pub ext: Arc<Extension<MemoryStore>>,
    pub clock: ManualClock,
    prompts: Mutex<mpsc::UnboundedReceiver<Prompt>>,
}

impl TestFixture {
    /// An extension with no vault yet.
    pub async fn empty(config: ExtensionConfig) -> Self {
        let clock = ManualClock::new(EPOCH_MS);
        let (popup, prompts) = RecordingPopup::new();
        let ext = Extension::open_with_clock(
            MemoryStore::new(),
            config,
            Arc::new(popup),
            Arc::new(clock.clone()),
        )
        .await
        .unwrap();
        Self {
            ext: Arc::new(ext),
            clock,
            prompts: Mutex::new(prompts),
        }
    }

    /// Onboarded with [`ABANDON`] under [`TEST_PASSWORD`], unlocked.
    pub async fn new() -> Self {
        Self::with_config(fast_config()).await
    }

    pub async fn with_config(config: ExtensionConfig) -> Self {
        let fixture = Self::empty(config).await;
        fixture
            .ext
            .onboard_with_mnemonic(TEST_PASSWORD, ABANDON)
            .await
            .unwrap();
        fixture
    }

    /// Send a page request from `origin` on a background task.
    pub fn request(&self, origin: &str, method: &str, params: Vec<Value>) -> JoinHandle<RpcResponse> {
        let bridge = self.ext.bridge().clone();
        let origin = origin.to_string();
        let request = RpcRequest::new(1, method, params);
        tokio::spawn(async move { bridge.handle(&origin, request).await })
    }

    /// The next prompt, failing the test after two seconds.
    pub async fn next_prompt(&self) -> Prompt {
        let mut prompts = self.prompts.lock().await;
        tokio::time::timeout(Duration::from_secs(2), prompts.recv())
            .await
            .expect("no prompt within 2s")
            .expect("popup dropped")
    }

    /// The id of the next approval prompt, skipping unlock prompts.
    pub async fn next_approval(&self) -> RequestId {
        loop {
            if let Prompt::Approve { request_id, .. } = self.next_prompt().await {
                return request_id;
            }
        }
    }

    /// Answer the next approval prompt.
    pub async fn decide_next(&self, approved: bool, public_key: Option<String>) -> RequestId {
        let id = self.next_approval().await;
        self.ext
            .bridge()
            .queue()
            .resolve(&id, approved, public_key)
            .await
            .unwrap();
        id
    }

    /// A prompt already queued, without waiting.
    pub async fn try_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().await.try_recv().ok()
    }
}
