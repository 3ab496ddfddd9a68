//! Password-based secret encryption.
//!
//! PBKDF2-HMAC-SHA256 stretches the password into a 256-bit key, and
//! ChaCha20-Poly1305 seals the secret. Decryption is all-or-nothing: a wrong
//! password or any tampered byte yields [`CoreError::Crypto`] and no plaintext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hmac::Hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CoreError, Result};

/// Default PBKDF2 iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Nonce ("iv") length in bytes.
pub const IV_LEN: usize = 12;

/// A secret sealed under a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    /// Ciphertext including the Poly1305 tag.
    pub ciphertext: Vec<u8>,
    /// Random PBKDF2 salt.
    pub salt: [u8; SALT_LEN],
    /// Random AEAD nonce.
    pub iv: [u8; IV_LEN],
    /// PBKDF2 iteration count used for this secret.
    pub iterations: u32,
}

impl EncryptedSecret {
    /// Decrypt with the given password.
    pub fn open(&self, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        decrypt_secret(&self.ciphertext, &self.salt, &self.iv, self.iterations, password)
    }
}

/// A 256-bit key stretched from a password.
#[derive(Zeroize, ZeroizeOnDrop)]
struct PasswordKey([u8; 32]);

impl PasswordKey {
    fn derive(password: &str, salt: &[u8], iterations: u32) -> Result<Self> {
        if iterations == 0 {
            return Err(CoreError::InvalidParameter(
                "kdf iterations must be at least 1".into(),
            ));
        }
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut key)
            .map_err(|e| CoreError::InvalidParameter(format!("pbkdf2: {e}")))?;
        Ok(Self(key))
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CoreError::Encryption(e.to_string()))
    }
}

/// Encrypt a secret under a password with a fresh salt and nonce.
pub fn encrypt_secret(plaintext: &[u8], password: &str, iterations: u32) -> Result<EncryptedSecret> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut iv);

    let key = PasswordKey::derive(password, &salt, iterations)?;
    let ciphertext = key
        .cipher()?
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CoreError::Encryption(e.to_string()))?;

    Ok(EncryptedSecret {
        ciphertext,
        salt,
        iv,
        iterations,
    })
}

/// Decrypt a secret. Fails closed with [`CoreError::Crypto`].
pub fn decrypt_secret(
    ciphertext: &[u8],
    salt: &[u8],
    iv: &[u8],
    iterations: u32,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    // A stored record with a bad shape is indistinguishable from tampering.
    if iv.len() != IV_LEN || iterations == 0 {
        return Err(CoreError::Crypto);
    }
    let key = PasswordKey::derive(password, salt, iterations).map_err(|_| CoreError::Crypto)?;
    key.cipher()?
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CoreError::Crypto)
}
