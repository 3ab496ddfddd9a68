//! Hierarchical deterministic key derivation.
//!
//! - Solana: SLIP-0010 Ed25519, path `m/44'/501'/index'/0'` (hardened only).
//! - EVM: BIP32 secp256k1, path `m/44'/60'/0'/0/index`.
//!
//! Both are pure functions of `(seed, path)`.

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::Sha512;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CoreError, Result};
use crate::mnemonic::Seed;

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Highest index a path component can carry. Larger values would collide
/// with the hardened flag bit.
pub const MAX_CHILD_INDEX: u32 = HARDENED_OFFSET - 1;
const ED25519_MASTER_KEY: &[u8] = b"ed25519 seed";
const SECP256K1_MASTER_KEY: &[u8] = b"Bitcoin seed";

/// One component of a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildIndex {
    pub index: u32,
    pub hardened: bool,
}

impl ChildIndex {
    pub const fn hardened(index: u32) -> Self {
        Self { index, hardened: true }
    }

    pub const fn normal(index: u32) -> Self {
        Self { index, hardened: false }
    }

    fn raw(self) -> Result<u32> {
        check_index(self.index)?;
        Ok(if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        })
    }
}

/// A BIP32-style derivation path such as `m/44'/60'/0'/0/3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(Vec<ChildIndex>);

impl DerivationPath {
    /// Solana burner path: `m/44'/501'/index'/0'`.
    pub fn solana(index: u32) -> Result<Self> {
        check_index(index)?;
        Ok(Self(vec![
            ChildIndex::hardened(44),
            ChildIndex::hardened(501),
            ChildIndex::hardened(index),
            ChildIndex::hardened(0),
        ]))
    }

    /// EVM burner path: `m/44'/60'/0'/0/index`.
    pub fn ethereum(index: u32) -> Result<Self> {
        check_index(index)?;
        Ok(Self(vec![
            ChildIndex::hardened(44),
            ChildIndex::hardened(60),
            ChildIndex::hardened(0),
            ChildIndex::normal(0),
            ChildIndex::normal(index),
        ]))
    }

    pub fn components(&self) -> &[ChildIndex] {
        &self.0
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for child in &self.0 {
            write!(f, "/{}", child.index)?;
            if child.hardened {
                f.write_str("'")?;
            }
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = CoreError;

    fn from_str(path: &str) -> Result<Self> {
        let mut parts = path.split('/');
        if parts.next() != Some("m") {
            return Err(CoreError::Derivation(format!(
                "path must start with 'm/': {path}"
            )));
        }

        let mut components = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
                Some(d) => (d, true),
                None => (part, false),
            };
            let index: u32 = digits
                .parse()
                .map_err(|_| CoreError::Derivation(format!("invalid path component: {part}")))?;
            check_index(index)?;
            components.push(ChildIndex { index, hardened });
        }
        Ok(Self(components))
    }
}

fn check_index(index: u32) -> Result<()> {
    if index > MAX_CHILD_INDEX {
        return Err(CoreError::Derivation(format!("index out of range: {index}")));
    }
    Ok(())
}

/// Derive a 32-byte Ed25519 secret via SLIP-0010.
///
/// Every path component must be hardened.
pub fn derive_ed25519_secret(seed: &[u8], path: &DerivationPath) -> Result<Zeroizing<[u8; 32]>> {
    let (mut key, mut chain_code) = split(&hmac_sha512(ED25519_MASTER_KEY, seed)?);

    for child in path.components() {
        if !child.hardened {
            return Err(CoreError::Derivation(
                "ed25519 derivation supports hardened indices only".into(),
            ));
        }
        let mut data = [0u8; 37];
        data[1..33].copy_from_slice(&key);
        data[33..].copy_from_slice(&child.raw()?.to_be_bytes());

        let i = hmac_sha512(&chain_code, &data)?;
        data.zeroize();
        key.zeroize();
        chain_code.zeroize();
        (key, chain_code) = split(&i);
    }

    chain_code.zeroize();
    let out = Zeroizing::new(key);
    key.zeroize();
    Ok(out)
}

/// Derive a secp256k1 secret key via BIP32.
pub fn derive_secp256k1_secret(seed: &[u8], path: &DerivationPath) -> Result<SecretKey> {
    let secp = Secp256k1::signing_only();
    let (mut key_bytes, mut chain_code) = split(&hmac_sha512(SECP256K1_MASTER_KEY, seed)?);
    let mut key = SecretKey::from_slice(&key_bytes)
        .map_err(|_| CoreError::Derivation("invalid master key".into()))?;
    key_bytes.zeroize();

    for child in path.components() {
        let mut data = Vec::with_capacity(37);
        if child.hardened {
            data.push(0u8);
            data.extend_from_slice(&key.secret_bytes());
        } else {
            data.extend_from_slice(&PublicKey::from_secret_key(&secp, &key).serialize());
        }
        data.extend_from_slice(&child.raw()?.to_be_bytes());

        let i = hmac_sha512(&chain_code, &data)?;
        data.zeroize();
        let (mut tweak_bytes, next_chain) = split(&i);

        let tweak = Scalar::from_be_bytes(tweak_bytes)
            .map_err(|_| CoreError::Derivation(format!("invalid child at {}", child.index)))?;
        tweak_bytes.zeroize();
        key = key
            .add_tweak(&tweak)
            .map_err(|_| CoreError::Derivation(format!("invalid child at {}", child.index)))?;

        chain_code.zeroize();
        chain_code = next_chain;
    }

    chain_code.zeroize();
    Ok(key)
}

/// Expand an imported 32-byte private key into a 64-byte pseudo-seed.
///
/// The halves are the key XOR 0x36 and the key XOR 0x5c. This lets the
/// companion chain derive identities from an imported key. It is a fixed,
/// reversible mapping and gives no unlinkability between the two identities.
pub fn expand_imported_key(key: &[u8; 32]) -> Seed {
    let mut out = [0u8; 64];
    for (i, byte) in key.iter().enumerate() {
        out[i] = byte ^ 0x36;
        out[32 + i] = byte ^ 0x5c;
    }
    let seed = Seed::from_bytes(out);
    out.zeroize();
    seed
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> Result<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| CoreError::Derivation(format!("hmac init: {e}")))?;
    mac.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split(i: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&i[..32]);
    right.copy_from_slice(&i[32..]);
    (left, right)
}
