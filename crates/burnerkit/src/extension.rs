//! The Extension: one background context's worth of burnerkit.
//!
//! Wires the store, vault, session and bridge together, runs the startup
//! keyspace migration, and owns the background tasks.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use zeroize::Zeroizing;

use burnerkit_bridge::{
    ApprovalBridge, BridgeConfig, BridgeHandle, BridgeWorker, ConnectedSite, PopupOpener,
};
use burnerkit_core::{BurnerWallet, Clock, ImportMode, Network, NetworkFamily, SystemClock};
use burnerkit_store::{KvStore, SqliteStore};
use burnerkit_vault::{
    migrate_keyspace, MigrationReport, SecretHolder, SessionConfig, SessionManager, Vault,
    VaultConfig, VaultError,
};

use crate::error::Result;

/// Configuration for every component.
#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    pub vault: VaultConfig,
    pub session: SessionConfig,
    pub bridge: BridgeConfig,
    /// Inbound message buffer of the bridge worker.
    pub worker_capacity: usize,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            vault: VaultConfig::default(),
            session: SessionConfig::default(),
            bridge: BridgeConfig::default(),
            worker_capacity: 64,
        }
    }
}

/// Handles to the running background tasks.
pub struct ExtensionTasks {
    /// Feed page requests and UI messages here.
    pub handle: BridgeHandle,
    pub worker: JoinHandle<()>,
    pub liveness: JoinHandle<()>,
}

impl ExtensionTasks {
    /// Stop the liveness task and let the worker drain.
    pub async fn shutdown(self) {
        self.liveness.abort();
        drop(self.handle);
        let _ = self.worker.await;
    }
}

/// The main Extension struct.
///
/// Provides a unified API for:
/// - Onboarding (mnemonic or imported key)
/// - Locking and unlocking
/// - Burner management
/// - Connected sites
/// - Running the approval bridge
pub struct Extension<S: KvStore> {
    vault: Arc<Vault<S>>,
    session: Arc<SessionManager<S>>,
    bridge: Arc<ApprovalBridge<S>>,
    config: ExtensionConfig,
    migration: MigrationReport,
}

impl Extension<SqliteStore> {
    /// Open (or create) an extension backed by a SQLite file.
    pub async fn open_path(
        path: impl AsRef<Path>,
        config: ExtensionConfig,
        popup: Arc<dyn PopupOpener>,
    ) -> Result<Self> {
        let store = SqliteStore::open(path)?;
        Self::open(store, config, popup).await
    }
}

impl<S: KvStore + 'static> Extension<S> {
    /// Open an extension over `store` using the system clock.
    pub async fn open(store: S, config: ExtensionConfig, popup: Arc<dyn PopupOpener>) -> Result<Self> {
        Self::open_with_clock(store, config, popup, Arc::new(SystemClock)).await
    }

    /// Open with an explicit clock.
    ///
    /// Legacy keys are migrated first. The session always starts locked,
    /// whatever the persisted flag says, since the password is never stored.
    pub async fn open_with_clock(
        store: S,
        config: ExtensionConfig,
        popup: Arc<dyn PopupOpener>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Arc::new(store);
        let migration = migrate_keyspace(store.as_ref()).await?;

        let vault = Arc::new(Vault::new(store, config.vault.clone(), clock.clone()));
        let session = Arc::new(SessionManager::new(
            vault.clone(),
            Arc::new(SecretHolder::new()),
            clock.clone(),
            config.session.clone(),
        ));
        session.lock().await?;

        let bridge = Arc::new(ApprovalBridge::new(
            vault.clone(),
            session.clone(),
            popup,
            clock,
            config.bridge.clone(),
        ));
        info!(migrated = !migration.is_noop(), "extension opened");

        Ok(Self {
            vault,
            session,
            bridge,
            config,
            migration,
        })
    }

    /// Start the bridge worker and the session liveness task.
    pub fn spawn(&self) -> ExtensionTasks {
        let (worker, handle) = BridgeWorker::new(self.bridge.clone(), self.config.worker_capacity);
        ExtensionTasks {
            handle,
            worker: worker.spawn(),
            liveness: self.session.clone().spawn_liveness(),
        }
    }

    pub fn vault(&self) -> &Arc<Vault<S>> {
        &self.vault
    }

    pub fn session(&self) -> &Arc<SessionManager<S>> {
        &self.session
    }

    pub fn bridge(&self) -> &Arc<ApprovalBridge<S>> {
        &self.bridge
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// What the startup migration rewrote.
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Onboarding
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn is_onboarded(&self) -> Result<bool> {
        Ok(self.vault.exists().await?)
    }

    /// Create the master vault from a mnemonic and unlock.
    pub async fn onboard_with_mnemonic(&self, password: &str, phrase: &str) -> Result<i64> {
        self.vault.create_from_mnemonic(password, phrase).await?;
        Ok(self.session.unlock(password).await?)
    }

    /// Create the master vault from a private key and unlock.
    pub async fn onboard_with_private_key(&self, password: &str, raw: &str) -> Result<ImportMode> {
        let mode = self.vault.create_from_private_key(password, raw).await?;
        self.session.unlock(password).await?;
        Ok(mode)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn unlock(&self, password: &str) -> Result<i64> {
        Ok(self.session.unlock(password).await?)
    }

    pub async fn lock(&self) -> Result<()> {
        Ok(self.session.lock().await?)
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_session_valid()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Burners
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate a burner with the session password.
    pub async fn generate_burner(&self, network: Network) -> Result<BurnerWallet> {
        let password = self.session.password().await?;
        let generated = self.vault.generate_burner(&password, network).await;
        let (burner, _) = self.relock_on_failure(generated).await?;
        Ok(burner)
    }

    /// Import a private key with the session password.
    pub async fn import_private_key(&self, raw: &str, index: Option<u32>) -> Result<BurnerWallet> {
        let password = self.session.password().await?;
        let imported = self.vault.import_private_key(&password, raw, index).await;
        self.relock_on_failure(imported).await
    }

    /// Export a burner's key. Always asks for the password again.
    pub async fn export_private_key(
        &self,
        password: &str,
        network: Network,
        index: u32,
    ) -> Result<Zeroizing<String>> {
        let exported = self.vault.export_private_key(password, network, index).await;
        self.relock_on_failure(exported).await
    }

    /// Reveal the recovery phrase. Always asks for the password again.
    pub async fn reveal_mnemonic(&self, password: &str) -> Result<Zeroizing<String>> {
        let revealed = self.vault.reveal_mnemonic(password).await;
        self.relock_on_failure(revealed).await
    }

    pub async fn burners(
        &self,
        family: Option<NetworkFamily>,
        include_archived: bool,
    ) -> Result<Vec<BurnerWallet>> {
        Ok(self.vault.list_burners(family, include_archived).await?)
    }

    pub async fn set_active(&self, family: NetworkFamily, index: u32) -> Result<BurnerWallet> {
        Ok(self.vault.set_active(family, index).await?)
    }

    pub async fn archive_burner(&self, family: NetworkFamily, index: u32) -> Result<BurnerWallet> {
        Ok(self.vault.archive_burner(family, index).await?)
    }

    /// Archive after a balance read if the balance is dust.
    pub async fn archive_if_dust(&self, family: NetworkFamily, index: u32, balance: u128) -> Result<bool> {
        Ok(self.vault.archive_if_dust(family, index, balance).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connected Sites
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn connected_sites(&self) -> Result<Vec<ConnectedSite>> {
        Ok(self.bridge.sites().list().await?)
    }

    pub async fn disconnect_site(&self, origin: &str) -> Result<bool> {
        let origin = burnerkit_bridge::normalize_origin(origin)?;
        Ok(self.bridge.sites().disconnect(&origin).await?)
    }

    /// Wrong password or integrity failure purges the session password.
    async fn relock_on_failure<T>(&self, result: std::result::Result<T, VaultError>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_crypto() || e.is_integrity() {
                    self.session.lock().await?;
                }
                Err(e.into())
            }
        }
    }
}
