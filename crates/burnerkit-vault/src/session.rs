//! Session lock state and password lifetime.
//!
//! `Locked -> Unlocked(expires_at) -> Locked`. Unlocking performs a real
//! decrypt of the master vault. The session re-locks on explicit lock, on
//! expiry, and on any decrypt failure; every re-lock purges the password.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use burnerkit_core::{keyspace, Clock};
use burnerkit_store::{KvStore, StoreExt};

use crate::error::{Result, VaultError};
use crate::secret::SecretHolder;
use crate::vault::Vault;

/// Configuration for session lifetime.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long an unlock lasts.
    pub ttl: Duration,
    /// How often the liveness task checks for expiry.
    pub liveness_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            liveness_interval: Duration::from_secs(60),
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocked {
        /// Unix ms after which the session is no longer valid.
        expires_at: i64,
    },
}

impl SessionState {
    pub fn is_locked(&self) -> bool {
        matches!(self, SessionState::Locked)
    }
}

/// Owns the lock state and the [`SecretHolder`].
pub struct SessionManager<S: KvStore> {
    vault: Arc<Vault<S>>,
    secret: Arc<SecretHolder>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
}

impl<S: KvStore> SessionManager<S> {
    /// Create a manager in the locked state.
    pub fn new(
        vault: Arc<Vault<S>>,
        secret: Arc<SecretHolder>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Locked);
        Self {
            vault,
            secret,
            clock,
            config,
            state,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Verify the password against the vault and start a session.
    ///
    /// Returns the new expiry (Unix ms). A wrong password locks the session.
    pub async fn unlock(&self, password: &str) -> Result<i64> {
        if let Err(e) = self.vault.verify_password(password).await {
            if e.is_crypto() {
                warn!("unlock failed, locking session");
                self.lock().await?;
            }
            return Err(e);
        }

        self.secret.set(password);
        let expires_at = self.arm().await?;
        info!(expires_at, "session unlocked");
        Ok(expires_at)
    }

    async fn arm(&self) -> Result<i64> {
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(self.config.ttl.as_millis() as i64);
        self.state
            .send_replace(SessionState::Unlocked { expires_at });

        let store = self.vault.store();
        store.put_record(keyspace::SESSION_LOCKED, &false).await?;
        store
            .put_record(keyspace::SESSION_EXPIRES_AT, &expires_at)
            .await?;
        Ok(expires_at)
    }

    /// Lock the session and purge the password.
    ///
    /// The in-memory purge happens before any storage write, so a storage
    /// failure still leaves the password gone.
    pub async fn lock(&self) -> Result<()> {
        self.secret.clear();
        let previous = self.state.send_replace(SessionState::Locked);
        if !previous.is_locked() {
            info!("session locked");
        }

        let store = self.vault.store();
        store.put_record(keyspace::SESSION_LOCKED, &true).await?;
        store.remove(keyspace::SESSION_EXPIRES_AT).await?;
        Ok(())
    }

    /// Unlocked, not expired, and holding a password.
    pub fn is_session_valid(&self) -> bool {
        match self.state() {
            SessionState::Locked => false,
            SessionState::Unlocked { expires_at } => {
                self.clock.now_millis() <= expires_at && self.secret.is_set()
            }
        }
    }

    /// Push the expiry out by one TTL. Never revives an expired session.
    pub async fn extend(&self) -> Result<Option<i64>> {
        if !self.is_session_valid() {
            return Ok(None);
        }
        let expires_at = self.arm().await?;
        debug!(expires_at, "session extended");
        Ok(Some(expires_at))
    }

    /// Lock if the session has expired. Returns whether it is still valid.
    pub async fn check_liveness(&self) -> Result<bool> {
        if self.state().is_locked() {
            return Ok(false);
        }
        if self.is_session_valid() {
            return Ok(true);
        }
        debug!("session expired");
        self.lock().await?;
        Ok(false)
    }

    /// The session password, if the session is valid.
    pub async fn password(&self) -> Result<Zeroizing<String>> {
        if self.is_session_valid() {
            if let Some(password) = self.secret.get() {
                return Ok(password);
            }
        }
        if !self.state().is_locked() {
            self.lock().await?;
        }
        Err(VaultError::SessionExpired)
    }
}

impl<S: KvStore + 'static> SessionManager<S> {
    /// Run [`SessionManager::check_liveness`] on every liveness tick.
    pub fn spawn_liveness(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.liveness_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.check_liveness().await {
                    warn!(error = %e, "liveness check failed");
                }
            }
        })
    }
}
