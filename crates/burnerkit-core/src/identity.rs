//! Signing identities for each network family.
//!
//! An [`Identity`] is the resolved key material for one burner slot. It never
//! implements `Clone` or `Debug` with secret content.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use secp256k1::{ecdsa::RecoverableSignature, Message, PublicKey, Secp256k1, SecretKey};
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

use crate::derivation::{derive_ed25519_secret, derive_secp256k1_secret, DerivationPath};
use crate::error::{CoreError, Result};
use crate::types::NetworkFamily;

/// Keccak-256 digest.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// An Ed25519 keypair addressed by its base58 public key.
pub struct SolanaKeypair {
    signing_key: SigningKey,
}

impl SolanaKeypair {
    /// Build from a 32-byte secret.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Base58 public key.
    pub fn address(&self) -> String {
        bs58::encode(self.signing_key.verifying_key().to_bytes()).into_string()
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Raw Ed25519 signature over the message bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// The 64-byte `secret || public` form, base58-encoded.
    pub fn export(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.signing_key.to_keypair_bytes());
        Zeroizing::new(bs58::encode(bytes.as_slice()).into_string())
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }
}

/// A secp256k1 key addressed by its EIP-55 checksummed address.
pub struct EvmWallet {
    secret: SecretKey,
}

impl EvmWallet {
    pub fn from_secret_key(secret: SecretKey) -> Self {
        Self { secret }
    }

    /// Build from 32 raw bytes; rejects zero and out-of-range scalars.
    pub fn from_secret(bytes: &[u8; 32]) -> Result<Self> {
        SecretKey::from_slice(bytes)
            .map(Self::from_secret_key)
            .map_err(|_| CoreError::Format("not a valid secp256k1 private key".into()))
    }

    /// EIP-55 checksummed `0x` address.
    pub fn address(&self) -> String {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &self.secret).serialize_uncompressed();
        let hash = keccak256(&public[1..]);
        to_checksum_address(&hash[12..])
    }

    /// EIP-191 `personal_sign`: 65 bytes `r || s || v` with `v = 27 + recid`.
    pub fn sign_personal_message(&self, message: &[u8]) -> [u8; 65] {
        let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
        prefixed.extend_from_slice(message);
        let digest = keccak256(&prefixed);

        let secp = Secp256k1::signing_only();
        let signature: RecoverableSignature =
            secp.sign_ecdsa_recoverable(&Message::from_digest(digest), &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&compact);
        out[64] = 27 + i32::from(recovery_id) as u8;
        out
    }

    /// Lowercase `0x`-prefixed hex private key.
    pub fn export(&self) -> Zeroizing<String> {
        let bytes = self.secret_bytes();
        Zeroizing::new(format!("0x{}", hex::encode(bytes.as_slice())))
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.secret_bytes())
    }
}

/// Apply the EIP-55 mixed-case checksum to a 20-byte address.
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Resolved key material for one burner slot.
pub enum Identity {
    Solana(SolanaKeypair),
    Evm(EvmWallet),
}

impl Identity {
    /// Derive the identity for `(family, index)` from a seed.
    pub fn derive(seed: &[u8], family: NetworkFamily, index: u32) -> Result<Self> {
        match family {
            NetworkFamily::Solana => {
                let secret = derive_ed25519_secret(seed, &DerivationPath::solana(index)?)?;
                Ok(Identity::Solana(SolanaKeypair::from_secret(&secret)))
            }
            NetworkFamily::Evm => {
                let secret = derive_secp256k1_secret(seed, &DerivationPath::ethereum(index)?)?;
                Ok(Identity::Evm(EvmWallet::from_secret_key(secret)))
            }
        }
    }

    pub fn family(&self) -> NetworkFamily {
        match self {
            Identity::Solana(_) => NetworkFamily::Solana,
            Identity::Evm(_) => NetworkFamily::Evm,
        }
    }

    pub fn address(&self) -> String {
        match self {
            Identity::Solana(kp) => kp.address(),
            Identity::Evm(wallet) => wallet.address(),
        }
    }

    /// Sign a message the way the family's wallets do.
    ///
    /// Solana: raw Ed25519. EVM: EIP-191 personal message.
    pub fn sign_message(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Identity::Solana(kp) => kp.sign(message).to_vec(),
            Identity::Evm(wallet) => wallet.sign_personal_message(message).to_vec(),
        }
    }

    /// The normalized export form of the private key.
    pub fn export(&self) -> Zeroizing<String> {
        match self {
            Identity::Solana(kp) => kp.export(),
            Identity::Evm(wallet) => wallet.export(),
        }
    }

    /// The raw 32-byte secret.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        match self {
            Identity::Solana(kp) => kp.secret_bytes(),
            Identity::Evm(wallet) => wallet.secret_bytes(),
        }
    }

    /// Fail with [`CoreError::Integrity`] unless the address matches `expected`.
    pub fn verify_address(&self, expected: &str, index: u32) -> Result<()> {
        let matches = match self {
            Identity::Solana(_) => self.address() == expected,
            Identity::Evm(_) => self.address().eq_ignore_ascii_case(expected),
        };
        if matches {
            Ok(())
        } else {
            Err(CoreError::Integrity {
                network: self.family(),
                index,
            })
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({}, {})", self.family(), self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::mnemonic_to_seed;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use secp256k1::ecdsa::RecoveryId;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    #[test]
    fn test_ethereum_address_vector() {
        let seed = mnemonic_to_seed(ABANDON).unwrap();
        let identity = Identity::derive(seed.as_bytes(), NetworkFamily::Evm, 0).unwrap();
        assert_eq!(identity.address(), "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
    }

    #[test]
    fn test_checksum_address_lowercase_input() {
        let raw = hex::decode("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(
            to_checksum_address(&raw),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn test_solana_sign_verifies() {
        let kp = SolanaKeypair::from_secret(&[5u8; 32]);
        let sig = kp.sign(b"hello");
        let vk = VerifyingKey::from_bytes(&kp.public_key_bytes()).unwrap();
        vk.verify(b"hello", &Signature::from_bytes(&sig)).unwrap();
    }

    #[test]
    fn test_personal_sign_recovers_signer() {
        let wallet = EvmWallet::from_secret(&[0x11; 32]).unwrap();
        let sig = wallet.sign_personal_message(b"hello");
        assert!(sig[64] == 27 || sig[64] == 28);

        let mut prefixed = b"\x19Ethereum Signed Message:\n5".to_vec();
        prefixed.extend_from_slice(b"hello");
        let digest = keccak256(&prefixed);

        let recid = RecoveryId::try_from((sig[64] - 27) as i32).unwrap();
        let recoverable = RecoverableSignature::from_compact(&sig[..64], recid).unwrap();
        let secp = Secp256k1::new();
        let public = secp
            .recover_ecdsa(&Message::from_digest(digest), &recoverable)
            .unwrap();
        let hash = keccak256(&public.serialize_uncompressed()[1..]);
        assert_eq!(to_checksum_address(&hash[12..]), wallet.address());
    }

    #[test]
    fn test_zero_evm_key_rejected() {
        assert!(EvmWallet::from_secret(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_verify_address_mismatch_is_integrity_error() {
        let identity = Identity::Solana(SolanaKeypair::from_secret(&[1u8; 32]));
        let err = identity.verify_address("SomeOtherAddress", 3).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Integrity { network: NetworkFamily::Solana, index: 3 }
        ));
    }

    #[test]
    fn test_export_roundtrip_lengths() {
        let kp = SolanaKeypair::from_secret(&[2u8; 32]);
        let decoded = bs58::decode(kp.export().as_str()).into_vec().unwrap();
        assert_eq!(decoded.len(), 64);

        let wallet = EvmWallet::from_secret(&[3u8; 32]).unwrap();
        assert_eq!(wallet.export().len(), 66);
    }
}
