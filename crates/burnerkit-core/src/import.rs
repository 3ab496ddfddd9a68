//! Private-key import with format auto-detection.
//!
//! Accepted forms:
//! - Ethereum: exactly 64 hex chars, optionally `0x`-prefixed.
//! - Solana: base58 or a JSON byte array, decoding to 32 or 64 bytes. Legacy
//!   33- and 65-byte forms carry a leading version byte that is dropped.
//!
//! The two never overlap: anything that is 64 hex chars is Ethereum, and a
//! Solana key never passes that length-and-charset check.

use ed25519_dalek::SigningKey;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CoreError, Result};
use crate::identity::{EvmWallet, Identity, SolanaKeypair};
use crate::types::NetworkFamily;

/// A parsed and normalized private key.
pub struct ImportedKey {
    /// The family the key belongs to.
    pub network: NetworkFamily,
    /// Normalized encoding: `0x` lowercase hex for EVM, base58 of the
    /// 64-byte keypair for Solana.
    pub normalized: Zeroizing<String>,
    secret: Zeroizing<[u8; 32]>,
}

impl ImportedKey {
    /// The raw 32-byte secret.
    pub fn secret(&self) -> &[u8; 32] {
        &self.secret
    }

    /// The signing identity this key represents.
    pub fn identity(&self) -> Result<Identity> {
        match self.network {
            NetworkFamily::Solana => Ok(Identity::Solana(SolanaKeypair::from_secret(&self.secret))),
            NetworkFamily::Evm => EvmWallet::from_secret(&self.secret).map(Identity::Evm),
        }
    }
}

impl std::fmt::Debug for ImportedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedKey")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Parse a user-supplied private key, detecting its family.
pub fn parse_private_key(raw: &str) -> Result<ImportedKey> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Format("empty input".into()));
    }

    if let Some(bytes) = parse_evm_hex(trimmed)? {
        return normalize_evm(bytes);
    }

    let bytes = if trimmed.starts_with('[') {
        parse_byte_array(trimmed)?
    } else {
        Zeroizing::new(
            bs58::decode(trimmed)
                .into_vec()
                .map_err(|_| CoreError::Format("not hex, base58 or a byte array".into()))?,
        )
    };
    normalize_solana(&bytes)
}

fn parse_evm_hex(input: &str) -> Result<Option<Zeroizing<[u8; 32]>>> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(None);
    }
    let mut out = Zeroizing::new([0u8; 32]);
    hex::decode_to_slice(digits, &mut out[..])
        .map_err(|e| CoreError::Format(format!("hex: {e}")))?;
    Ok(Some(out))
}

fn parse_byte_array(input: &str) -> Result<Zeroizing<Vec<u8>>> {
    serde_json::from_str::<Vec<u8>>(input)
        .map(Zeroizing::new)
        .map_err(|_| CoreError::Format("byte array must be a JSON list of 0-255".into()))
}

fn normalize_evm(bytes: Zeroizing<[u8; 32]>) -> Result<ImportedKey> {
    let wallet = EvmWallet::from_secret(&bytes)?;
    Ok(ImportedKey {
        network: NetworkFamily::Evm,
        normalized: wallet.export(),
        secret: bytes,
    })
}

fn normalize_solana(bytes: &[u8]) -> Result<ImportedKey> {
    let body = match bytes.len() {
        32 | 64 => bytes,
        33 | 65 => &bytes[1..],
        n => {
            return Err(CoreError::Format(format!(
                "solana key must decode to 32 or 64 bytes, got {n}"
            )))
        }
    };

    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&body[..32]);
    let signing_key = SigningKey::from_bytes(&secret);

    if body.len() == 64 && signing_key.verifying_key().as_bytes() != &body[32..] {
        return Err(CoreError::Format(
            "public half does not match secret half".into(),
        ));
    }

    let mut keypair = signing_key.to_keypair_bytes();
    let normalized = Zeroizing::new(bs58::encode(&keypair).into_string());
    keypair.zeroize();

    Ok(ImportedKey {
        network: NetworkFamily::Solana,
        normalized,
        secret,
    })
}
