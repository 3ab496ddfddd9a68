//! # Burnerkit Core
//!
//! Pure primitives for a multi-chain burner key vault.
//!
//! This crate contains no I/O, no storage, no networking. It covers password
//! encryption of the master secret, BIP39 mnemonics, HD derivation for Solana
//! and EVM, private-key import, and burner index allocation.
//!
//! ## Key Types
//!
//! - [`EncryptedSecret`] - A secret sealed under a password
//! - [`Identity`] - Resolved signing key for one burner slot
//! - [`BurnerWallet`] - Registry record for a burner
//! - [`MasterVault`] - The single encrypted master secret
//! - [`Network`] / [`NetworkFamily`] - Where a burner lives
//!
//! ## Derivation
//!
//! Solana uses SLIP-0010 Ed25519 at `m/44'/501'/index'/0'`. EVM uses BIP32
//! secp256k1 at `m/44'/60'/0'/0/index`. See [`derivation`].

pub mod burner;
pub mod cipher;
pub mod clock;
pub mod derivation;
pub mod error;
pub mod identity;
pub mod import;
pub mod keyspace;
pub mod mnemonic;
pub mod types;

pub use burner::{allocate_index, BurnerWallet, RetiredIndexSet};
pub use cipher::{decrypt_secret, encrypt_secret, EncryptedSecret, DEFAULT_KDF_ITERATIONS};
pub use clock::{now_millis, Clock, ManualClock, SystemClock};
pub use derivation::{expand_imported_key, DerivationPath, MAX_CHILD_INDEX};
pub use error::{CoreError, Result};
pub use identity::{EvmWallet, Identity, SolanaKeypair};
pub use import::{parse_private_key, ImportedKey};
pub use mnemonic::{generate_mnemonic, mnemonic_to_seed, validate_mnemonic, Seed};
pub use types::{ImportMode, MasterVault, Network, NetworkFamily};
