//! # Burnerkit Store
//!
//! Namespaced key-value storage. Every other burnerkit component persists
//! through the [`KvStore`] trait and never sees the backend.
//!
//! ## Key Types
//!
//! - [`KvStore`] - The async trait for all storage operations
//! - [`StoreExt`] - CBOR-typed records on top of raw bytes
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoreEvent`] - A mutation published on the change feed
//!
//! ## Usage
//!
//! ```rust,no_run
//! use burnerkit_store::{SqliteStore, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("burnerkit.db").unwrap();
//!     store.put_record("session:locked", &true).await.unwrap();
//!     let locked: Option<bool> = store.get_record("session:locked").await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Per-key atomicity**: no multi-key transactions are offered
//! - **Take**: atomic read-and-remove for exactly-once consumption
//! - **Change feed**: waiters subscribe instead of busy polling

pub mod error;
pub mod feed;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use feed::{ChangeFeed, ChangeKind, StoreEvent};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{decode_record, encode_record, KvStore, StoreExt};
