//! # Burnerkit Testkit
//!
//! Testing utilities for burnerkit.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Known vectors**: Published BIP39 / BIP44 / SLIP-0010 values
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A wired extension with a manual clock and recorded prompts
//!
//! ## Known Vectors
//!
//! ```rust
//! use burnerkit_testkit::vectors::verify_all_vectors;
//!
//! assert!(verify_all_vectors().is_empty());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use burnerkit_testkit::generators::{network, index, seed};
//!
//! proptest! {
//!     #[test]
//!     fn derivation_is_deterministic(seed in seed(), network in network(), index in index()) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use burnerkit_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new().await;
//! let pending = fixture.request("https://app.example", "eth_requestAccounts", vec![]);
//! fixture.decide_next(true, None).await;
//! let response = pending.await.unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fast_config, RecordingPopup, TestFixture, ABANDON, TEST_PASSWORD};
pub use vectors::{address_vectors, slip10_vectors, verify_all_vectors, AddressVector, Slip10Vector};
