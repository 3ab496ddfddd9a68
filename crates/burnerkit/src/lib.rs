//! # Burnerkit
//!
//! The unified API for burnerkit: disposable multi-chain signing identities
//! behind one encrypted master secret, and an approval bridge that mediates
//! every page request to connect or sign.
//!
//! ## Overview
//!
//! - **Vault**: Mnemonic or imported-key onboarding, HD derivation for Solana
//!   (`m/44'/501'/i'/0'`) and EVM (`m/44'/60'/0'/0/i`), per-slot key imports
//! - **Burners**: Per-family index sequences; archived indices are retired
//!   and never reused
//! - **Session**: Password-verified unlock with a 15 minute expiry
//! - **Bridge**: EIP-1193-shaped page protocol with explicit approvals
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use burnerkit::{Extension, ExtensionConfig, Network};
//! use burnerkit::bridge::NoopPopup;
//!
//! async fn example() {
//!     let ext = Extension::open_path("burnerkit.db", ExtensionConfig::default(), Arc::new(NoopPopup))
//!         .await
//!         .unwrap();
//!
//!     let phrase = burnerkit::core::generate_mnemonic().unwrap();
//!     ext.onboard_with_mnemonic("password", &phrase).await.unwrap();
//!
//!     let burner = ext.generate_burner(Network::Solana).await.unwrap();
//!     println!("burner {} at {}", burner.index, burner.address);
//!
//!     // Page requests and UI messages go through the worker handle.
//!     let tasks = ext.spawn();
//!     // let reply = tasks.handle.send(message).await?;
//!     tasks.shutdown().await;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `burnerkit::core` - Primitives (cipher, derivation, identities)
//! - `burnerkit::store` - Key-value storage and SQLite
//! - `burnerkit::vault` - Vault and session manager
//! - `burnerkit::bridge` - Approval bridge and protocol messages

pub mod error;
pub mod extension;

// Re-export component crates
pub use burnerkit_bridge as bridge;
pub use burnerkit_core as core;
pub use burnerkit_store as store;
pub use burnerkit_vault as vault;

pub use error::{ExtensionError, Result};
pub use extension::{Extension, ExtensionConfig, ExtensionTasks};

pub use burnerkit_core::{BurnerWallet, Identity, ImportMode, Network, NetworkFamily};
