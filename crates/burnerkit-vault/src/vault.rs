//! The Vault: master secret lifecycle, burner registry, and key resolution.
//!
//! One encrypted master secret (a mnemonic or an imported private key) backs
//! any number of burner identities. Slots can be overridden by individually
//! imported keys. Every key that leaves the vault is re-derived and checked
//! against the stored burner address first.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use burnerkit_core::mnemonic::normalize_phrase;
use burnerkit_core::{
    allocate_index, encrypt_secret, expand_imported_key, keyspace, mnemonic_to_seed,
    parse_private_key, validate_mnemonic, BurnerWallet, Clock, CoreError, EncryptedSecret,
    Identity, ImportMode, ImportedKey, MasterVault, Network, NetworkFamily, RetiredIndexSet, Seed,
    DEFAULT_KDF_ITERATIONS, MAX_CHILD_INDEX,
};
use burnerkit_store::{KvStore, StoreExt};

use crate::error::{Result, VaultError};

/// Configuration for the Vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// PBKDF2 iterations for newly encrypted secrets.
    pub kdf_iterations: u32,
    /// Balance in lamports below which a Solana burner counts as dust.
    pub solana_dust_threshold: u128,
    /// Balance in wei below which an EVM burner counts as dust.
    pub evm_dust_threshold: u128,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            solana_dust_threshold: 890_880,
            evm_dust_threshold: 10_000_000_000_000,
        }
    }
}

impl VaultConfig {
    pub fn dust_threshold(&self, family: NetworkFamily) -> u128 {
        match family {
            NetworkFamily::Solana => self.solana_dust_threshold,
            NetworkFamily::Evm => self.evm_dust_threshold,
        }
    }
}

/// An encrypted private key that overrides seed derivation for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedKeyRecord {
    pub network: NetworkFamily,
    pub index: u32,
    /// The normalized key, encrypted under the vault password.
    pub secret: EncryptedSecret,
    pub created_at: i64,
}

/// The decrypted master secret, ready for derivation.
struct Unsealed {
    mode: ImportMode,
    seed: Seed,
    imported: Option<ImportedKey>,
}

/// A resolved identity and where it came from.
struct Resolved {
    identity: Identity,
    imported: bool,
}

/// The main Vault struct.
///
/// Provides:
/// - Onboarding from a mnemonic or an imported private key
/// - Burner generation with retired-index skipping
/// - Per-slot private key imports
/// - Integrity-checked key resolution and export
pub struct Vault<S: KvStore> {
    store: Arc<S>,
    config: VaultConfig,
    clock: Arc<dyn Clock>,
    /// Serializes read-modify-write on counters, retired sets and burner records.
    registry: Mutex<()>,
}

impl<S: KvStore> Vault<S> {
    /// Create a vault over the given store.
    pub fn new(store: Arc<S>, config: VaultConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
            registry: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Onboarding
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether a master vault exists.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.store.get(keyspace::VAULT_MASTER).await?.is_some())
    }

    /// The stored master vault.
    pub async fn master(&self) -> Result<MasterVault> {
        self.store
            .get_record(keyspace::VAULT_MASTER)
            .await?
            .ok_or(VaultError::NotInitialized)
    }

    /// Create the master vault from a BIP39 phrase.
    pub async fn create_from_mnemonic(&self, password: &str, phrase: &str) -> Result<()> {
        if !validate_mnemonic(phrase) {
            return Err(CoreError::InvalidMnemonic("bad word list or checksum".into()).into());
        }
        let normalized = normalize_phrase(phrase);
        self.write_master(password, normalized.as_bytes(), ImportMode::Seed)
            .await
    }

    /// Create the master vault from an imported private key.
    ///
    /// The key becomes index 0 of its family. The other family derives from
    /// the key's expanded pseudo-seed.
    pub async fn create_from_private_key(&self, password: &str, raw: &str) -> Result<ImportMode> {
        let key = parse_private_key(raw)?;
        let mode = match key.network {
            NetworkFamily::Solana => ImportMode::ImportedSolanaKey,
            NetworkFamily::Evm => ImportMode::ImportedEthereumKey,
        };
        self.write_master(password, key.normalized.as_bytes(), mode)
            .await?;
        Ok(mode)
    }

    async fn write_master(&self, password: &str, plaintext: &[u8], mode: ImportMode) -> Result<()> {
        let _guard = self.registry.lock().await;
        if self.exists().await? {
            return Err(VaultError::AlreadyInitialized);
        }
        let master = MasterVault {
            secret: encrypt_secret(plaintext, password, self.config.kdf_iterations)?,
            import_mode: mode,
            created_at: self.clock.now_millis(),
        };
        self.store.put_record(keyspace::VAULT_MASTER, &master).await?;
        info!(?mode, "master vault created");
        Ok(())
    }

    /// Check the password by decrypting the master secret.
    pub async fn verify_password(&self, password: &str) -> Result<()> {
        self.master().await?.secret.open(password)?;
        Ok(())
    }

    /// Decrypt and return the mnemonic. Only for seed-backed vaults.
    pub async fn reveal_mnemonic(&self, password: &str) -> Result<Zeroizing<String>> {
        let master = self.master().await?;
        if master.import_mode != ImportMode::Seed {
            return Err(VaultError::NotSupported(
                "vault was created from a private key and has no mnemonic".into(),
            ));
        }
        let plaintext = master.secret.open(password)?;
        Ok(Zeroizing::new(utf8(&plaintext)?.to_string()))
    }

    async fn unseal(&self, password: &str) -> Result<Unsealed> {
        let master = self.master().await?;
        let plaintext = master.secret.open(password)?;
        let text = utf8(&plaintext)?;
        match master.import_mode {
            ImportMode::Seed => Ok(Unsealed {
                mode: master.import_mode,
                seed: mnemonic_to_seed(text)?,
                imported: None,
            }),
            ImportMode::ImportedSolanaKey | ImportMode::ImportedEthereumKey => {
                let key = parse_private_key(text)?;
                Ok(Unsealed {
                    mode: master.import_mode,
                    seed: expand_imported_key(key.secret()),
                    imported: Some(key),
                })
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve the signing identity for a slot.
    ///
    /// Order: per-slot import, then the master imported key at index 0, then
    /// seed derivation. The result must match the stored burner address.
    pub async fn resolve_keypair(
        &self,
        password: &str,
        network: Network,
        index: u32,
    ) -> Result<Identity> {
        let family = network.family();
        let resolved = self.resolve_unchecked(password, family, index).await?;
        if let Some(burner) = self.burner(family, index).await? {
            if let Err(e) = resolved.identity.verify_address(&burner.address, index) {
                warn!(network = %family, index, "derived address does not match stored burner");
                return Err(e.into());
            }
        }
        Ok(resolved.identity)
    }

    async fn resolve_unchecked(
        &self,
        password: &str,
        family: NetworkFamily,
        index: u32,
    ) -> Result<Resolved> {
        let record: Option<ImportedKeyRecord> =
            self.store.get_record(&keyspace::import(family, index)).await?;
        if let Some(record) = record {
            debug!(network = %family, index, "resolved from imported key");
            return Ok(Resolved {
                identity: open_import(&record, password)?,
                imported: true,
            });
        }

        let unsealed = self.unseal(password).await?;
        if index == 0 && unsealed.mode.imported_family() == Some(family) {
            if let Some(key) = &unsealed.imported {
                return Ok(Resolved {
                    identity: key.identity()?,
                    imported: true,
                });
            }
        }

        Ok(Resolved {
            identity: Identity::derive(unsealed.seed.as_bytes(), family, index)?,
            imported: false,
        })
    }

    /// Export a burner's private key in its family's normalized form.
    pub async fn export_private_key(
        &self,
        password: &str,
        network: Network,
        index: u32,
    ) -> Result<Zeroizing<String>> {
        let family = network.family();
        if self.burner(family, index).await?.is_none() {
            return Err(VaultError::BurnerNotFound {
                network: family,
                index,
            });
        }
        let identity = self.resolve_keypair(password, network, index).await?;
        Ok(identity.export())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Burner Generation and Import
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a burner at the next free, non-retired index.
    pub async fn generate_burner(
        &self,
        password: &str,
        network: Network,
    ) -> Result<(BurnerWallet, Identity)> {
        let family = network.family();
        let _guard = self.registry.lock().await;

        let (index, next) = self.next_index(family).await?;
        let resolved = self.resolve_unchecked(password, family, index).await?;

        let mut wallet = BurnerWallet::new(
            family,
            index,
            resolved.identity.address(),
            self.clock.now_millis(),
        );
        wallet.imported = resolved.imported;
        wallet.is_active = self.active_in(family).await?.is_none();
        self.store
            .put_record(&keyspace::burner(family, index), &wallet)
            .await?;
        self.store
            .put_record(&keyspace::counter(family), &next)
            .await?;

        info!(network = %family, index, "burner generated");
        Ok((wallet, resolved.identity))
    }

    /// Pick the next index. Returns `(index, next_counter)`; the caller
    /// persists the counter once the slot is written.
    async fn next_index(&self, family: NetworkFamily) -> Result<(u32, u32)> {
        let counter = self.counter(family).await?;
        let retired = self.retired_indices(family).await?;
        let occupied: BTreeSet<u32> = self
            .list_family(family)
            .await?
            .into_iter()
            .map(|b| b.index)
            .collect();

        allocate_index(counter, &retired, |i| occupied.contains(&i))
            .ok_or(VaultError::IndexExhausted(family))
    }

    async fn bump_counter(&self, family: NetworkFamily, index: u32) -> Result<()> {
        let counter = self.counter(family).await?;
        let floor = index.saturating_add(1);
        if counter < floor {
            self.store
                .put_record(&keyspace::counter(family), &floor)
                .await?;
        }
        Ok(())
    }

    /// Import a private key into a burner slot.
    ///
    /// Solana keys go to `index`, or the next free index when `None`.
    /// Ethereum keys always occupy EVM index 0 and also seed a companion
    /// Solana identity at index 0, derived from the expanded key.
    pub async fn import_private_key(
        &self,
        password: &str,
        raw: &str,
        index: Option<u32>,
    ) -> Result<BurnerWallet> {
        let key = parse_private_key(raw)?;
        self.verify_password(password).await?;
        let _guard = self.registry.lock().await;

        match key.network {
            NetworkFamily::Solana => {
                let index = match index {
                    Some(index) => {
                        if index > MAX_CHILD_INDEX {
                            return Err(VaultError::IndexOutOfRange {
                                network: NetworkFamily::Solana,
                                index,
                            });
                        }
                        self.ensure_not_retired(NetworkFamily::Solana, index).await?;
                        index
                    }
                    None => self.next_index(NetworkFamily::Solana).await?.0,
                };
                let wallet = self.store_import(password, &key, index).await?;
                self.bump_counter(NetworkFamily::Solana, index).await?;
                Ok(wallet)
            }
            NetworkFamily::Evm => {
                if let Some(index) = index.filter(|i| *i != 0) {
                    return Err(VaultError::NotSupported(format!(
                        "ethereum keys import into index 0 only, not {index}"
                    )));
                }
                self.ensure_not_retired(NetworkFamily::Evm, 0).await?;
                let wallet = self.store_import(password, &key, 0).await?;
                self.bump_counter(NetworkFamily::Evm, 0).await?;

                if self
                    .retired_indices(NetworkFamily::Solana)
                    .await?
                    .contains(0)
                {
                    warn!("solana index 0 is retired, skipping companion identity");
                } else {
                    let pseudo_seed = expand_imported_key(key.secret());
                    let companion = Identity::derive(pseudo_seed.as_bytes(), NetworkFamily::Solana, 0)?;
                    let companion_key = parse_private_key(&companion.export())?;
                    self.store_import(password, &companion_key, 0).await?;
                    self.bump_counter(NetworkFamily::Solana, 0).await?;
                }
                Ok(wallet)
            }
        }
    }

    async fn ensure_not_retired(&self, family: NetworkFamily, index: u32) -> Result<()> {
        if self.retired_indices(family).await?.contains(index) {
            return Err(VaultError::IndexRetired {
                network: family,
                index,
            });
        }
        Ok(())
    }

    async fn store_import(
        &self,
        password: &str,
        key: &ImportedKey,
        index: u32,
    ) -> Result<BurnerWallet> {
        let family = key.network;
        let now = self.clock.now_millis();
        let record = ImportedKeyRecord {
            network: family,
            index,
            secret: encrypt_secret(key.normalized.as_bytes(), password, self.config.kdf_iterations)?,
            created_at: now,
        };
        self.store
            .put_record(&keyspace::import(family, index), &record)
            .await?;

        let address = key.identity()?.address();
        let wallet = match self.burner(family, index).await? {
            Some(mut existing) => {
                existing.address = address;
                existing.imported = true;
                existing
            }
            None => {
                let mut wallet = BurnerWallet::new(family, index, address, now);
                wallet.imported = true;
                wallet.is_active = self.active_in(family).await?.is_none();
                wallet
            }
        };
        self.store
            .put_record(&keyspace::burner(family, index), &wallet)
            .await?;

        info!(network = %family, index, "private key imported");
        Ok(wallet)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Next index the family counter points at.
    pub async fn counter(&self, family: NetworkFamily) -> Result<u32> {
        Ok(self
            .store
            .get_record(&keyspace::counter(family))
            .await?
            .unwrap_or(0))
    }

    pub async fn retired_indices(&self, family: NetworkFamily) -> Result<RetiredIndexSet> {
        Ok(self
            .store
            .get_record(&keyspace::retired(family))
            .await?
            .unwrap_or_default())
    }

    pub async fn burner(&self, family: NetworkFamily, index: u32) -> Result<Option<BurnerWallet>> {
        Ok(self
            .store
            .get_record(&keyspace::burner(family, index))
            .await?)
    }

    async fn list_family(&self, family: NetworkFamily) -> Result<Vec<BurnerWallet>> {
        let mut burners: Vec<BurnerWallet> = self
            .store
            .scan_prefix(&keyspace::burner_family_prefix(family))
            .await?
            .into_iter()
            .map(|(_, wallet)| wallet)
            .collect();
        burners.sort_by_key(|b: &BurnerWallet| b.index);
        Ok(burners)
    }

    /// List burners, ordered by family then index.
    pub async fn list_burners(
        &self,
        family: Option<NetworkFamily>,
        include_archived: bool,
    ) -> Result<Vec<BurnerWallet>> {
        let families = match family {
            Some(family) => vec![family],
            None => vec![NetworkFamily::Solana, NetworkFamily::Evm],
        };
        let mut out = Vec::new();
        for family in families {
            out.extend(
                self.list_family(family)
                    .await?
                    .into_iter()
                    .filter(|b| include_archived || !b.archived),
            );
        }
        Ok(out)
    }

    /// Find a burner of any family by address.
    pub async fn find_burner_by_address(&self, address: &str) -> Result<Option<BurnerWallet>> {
        Ok(self
            .list_burners(None, true)
            .await?
            .into_iter()
            .find(|b| b.has_address(address)))
    }

    /// The active burner of a family.
    pub async fn active_burner(&self, family: NetworkFamily) -> Result<Option<BurnerWallet>> {
        self.active_in(family).await
    }

    async fn active_in(&self, family: NetworkFamily) -> Result<Option<BurnerWallet>> {
        Ok(self
            .list_family(family)
            .await?
            .into_iter()
            .find(|b| b.is_active && !b.archived))
    }

    /// Make one burner the active one of its family.
    pub async fn set_active(&self, family: NetworkFamily, index: u32) -> Result<BurnerWallet> {
        let _guard = self.registry.lock().await;
        let target = self
            .burner(family, index)
            .await?
            .ok_or(VaultError::BurnerNotFound {
                network: family,
                index,
            })?;
        if target.archived {
            return Err(VaultError::IndexRetired {
                network: family,
                index,
            });
        }

        let mut activated = target;
        for mut wallet in self.list_family(family).await? {
            let should_be_active = wallet.index == index;
            if wallet.is_active != should_be_active {
                wallet.is_active = should_be_active;
                self.store
                    .put_record(&keyspace::burner(family, wallet.index), &wallet)
                    .await?;
            }
            if should_be_active {
                activated = wallet;
            }
        }
        debug!(network = %family, index, "active burner changed");
        Ok(activated)
    }

    /// Soft-delete a burner and retire its index.
    pub async fn archive_burner(&self, family: NetworkFamily, index: u32) -> Result<BurnerWallet> {
        let _guard = self.registry.lock().await;
        self.archive_locked(family, index).await
    }

    async fn archive_locked(&self, family: NetworkFamily, index: u32) -> Result<BurnerWallet> {
        let mut wallet = self
            .burner(family, index)
            .await?
            .ok_or(VaultError::BurnerNotFound {
                network: family,
                index,
            })?;
        let was_active = wallet.is_active;
        wallet.archived = true;
        wallet.is_active = false;
        self.store
            .put_record(&keyspace::burner(family, index), &wallet)
            .await?;
        self.retire_locked(family, index).await?;

        if was_active {
            let next = self
                .list_family(family)
                .await?
                .into_iter()
                .find(|b| !b.archived);
            if let Some(mut next) = next {
                next.is_active = true;
                self.store
                    .put_record(&keyspace::burner(family, next.index), &next)
                    .await?;
            }
        }

        info!(network = %family, index, "burner archived");
        Ok(wallet)
    }

    /// Permanently exclude an index from allocation. Returns false if it
    /// was already retired.
    pub async fn retire(&self, family: NetworkFamily, index: u32) -> Result<bool> {
        let _guard = self.registry.lock().await;
        self.retire_locked(family, index).await
    }

    async fn retire_locked(&self, family: NetworkFamily, index: u32) -> Result<bool> {
        let mut retired = self.retired_indices(family).await?;
        let inserted = retired.insert(index);
        if inserted {
            self.store
                .put_record(&keyspace::retired(family), &retired)
                .await?;
            debug!(network = %family, index, "index retired");
        }
        Ok(inserted)
    }

    /// Archive the burner if `balance` is below the family's dust threshold.
    pub async fn archive_if_dust(
        &self,
        family: NetworkFamily,
        index: u32,
        balance: u128,
    ) -> Result<bool> {
        if balance >= self.config.dust_threshold(family) {
            return Ok(false);
        }
        let _guard = self.registry.lock().await;
        match self.burner(family, index).await? {
            Some(wallet) if !wallet.archived => {
                self.archive_locked(family, index).await?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(VaultError::BurnerNotFound {
                network: family,
                index,
            }),
        }
    }
}

fn open_import(record: &ImportedKeyRecord, password: &str) -> Result<Identity> {
    let plaintext = record.secret.open(password)?;
    let key = parse_private_key(utf8(&plaintext)?)?;
    if key.network != record.network {
        return Err(CoreError::Integrity {
            network: record.network,
            index: record.index,
        }
        .into());
    }
    Ok(key.identity()?)
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|_| CoreError::Format("stored secret is not valid utf-8".into()).into())
}
