//! BIP39 mnemonic generation, validation, and seed derivation.

use bip39::{Language, Mnemonic};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CoreError, Result};

/// Words in a freshly generated phrase.
pub const WORD_COUNT: usize = 12;

/// A 64-byte BIP39 seed (or an expanded pseudo-seed). Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 64]);

impl Seed {
    pub const LEN: usize = 64;

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

// Seed does not implement Clone/Debug.

/// Generate a new random 12-word English phrase.
pub fn generate_mnemonic() -> Result<Zeroizing<String>> {
    let mut entropy = Zeroizing::new([0u8; 16]);
    rand::thread_rng().fill_bytes(&mut entropy[..]);

    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..])
        .map_err(|e| CoreError::InvalidMnemonic(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Collapse whitespace and case so user-typed phrases parse.
pub fn normalize_phrase(phrase: &str) -> Zeroizing<String> {
    Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn parse(phrase: &str) -> Result<Mnemonic> {
    let normalized = normalize_phrase(phrase);
    Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| CoreError::InvalidMnemonic(e.to_string()))
}

/// Check word list membership, length and checksum.
pub fn validate_mnemonic(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

/// Derive the 64-byte seed with an empty passphrase.
pub fn mnemonic_to_seed(phrase: &str) -> Result<Seed> {
    let mnemonic = parse(phrase)?;
    Ok(Seed(mnemonic.to_seed_normalized("")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    #[test]
    fn test_generate_produces_twelve_valid_words() {
        let phrase = generate_mnemonic().unwrap();
        assert_eq!(phrase.split_whitespace().count(), WORD_COUNT);
        assert!(validate_mnemonic(&phrase));
    }

    #[test]
    fn test_validate_rejects_bad_checksum() {
        let phrase = ["abandon"; 12].join(" ");
        assert!(!validate_mnemonic(&phrase));
    }

    #[test]
    fn test_validate_rejects_unknown_word() {
        let phrase = ABANDON.replace("about", "aboot");
        assert!(!validate_mnemonic(&phrase));
    }

    #[test]
    fn test_validate_tolerates_case_and_spacing() {
        let messy = format!("  {}  ", ABANDON.to_uppercase().replace(' ', "   "));
        assert!(validate_mnemonic(&messy));
    }

    #[test]
    fn test_seed_vector() {
        let seed = mnemonic_to_seed(ABANDON).unwrap();
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }
}
