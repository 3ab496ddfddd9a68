//! Known derivation vectors.
//!
//! Published BIP39, BIP44 and SLIP-0010 values. Any implementation that
//! disagrees with these derives different wallets from the same backup.

use burnerkit_core::derivation::derive_ed25519_secret;
use burnerkit_core::{mnemonic_to_seed, DerivationPath, Identity, NetworkFamily, SolanaKeypair};

use crate::fixtures::ABANDON;

/// A mnemonic-to-address vector.
#[derive(Debug, Clone)]
pub struct AddressVector {
    pub name: &'static str,
    pub mnemonic: &'static str,
    pub family: NetworkFamily,
    pub index: u32,
    pub expected_address: &'static str,
}

/// A raw-seed SLIP-0010 Ed25519 vector.
#[derive(Debug, Clone)]
pub struct Slip10Vector {
    pub name: &'static str,
    pub seed_hex: &'static str,
    pub path: &'static str,
    pub expected_secret: &'static str,
    pub expected_public: &'static str,
}

/// BIP39 seed of [`ABANDON`] with an empty passphrase.
pub const ABANDON_SEED_HEX: &str = "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
                                    9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4";

pub fn address_vectors() -> Vec<AddressVector> {
    vec![AddressVector {
        name: "abandon/ethereum/0",
        mnemonic: ABANDON,
        family: NetworkFamily::Evm,
        index: 0,
        expected_address: "0x9858EfFD232B4033E47d90003D41EC34EcaEda94",
    }]
}

/// SLIP-0010 test vector 1 (ed25519).
pub fn slip10_vectors() -> Vec<Slip10Vector> {
    vec![
        Slip10Vector {
            name: "slip10-1/m",
            seed_hex: "000102030405060708090a0b0c0d0e0f",
            path: "m",
            expected_secret: "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7",
            expected_public: "a4b2856bfec510abab89753fac1ac0e1112364e7d250545963f135f2a33188ed",
        },
        Slip10Vector {
            name: "slip10-1/m/0'",
            seed_hex: "000102030405060708090a0b0c0d0e0f",
            path: "m/0'",
            expected_secret: "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3",
            expected_public: "8c8a13df77a28f3445213a0f432fde644acaa215fc72dcdf300d5efaa85d350c",
        },
    ]
}

/// Check every vector. Returns the names of those that fail.
pub fn verify_all_vectors() -> Vec<&'static str> {
    let mut failures = Vec::new();

    match mnemonic_to_seed(ABANDON) {
        Ok(seed) if hex::encode(seed.as_bytes()) == ABANDON_SEED_HEX => {}
        _ => failures.push("abandon/seed"),
    }

    for vector in address_vectors() {
        let derived = mnemonic_to_seed(vector.mnemonic)
            .and_then(|seed| Identity::derive(seed.as_bytes(), vector.family, vector.index));
        match derived {
            Ok(identity) if identity.address() == vector.expected_address => {}
            _ => failures.push(vector.name),
        }
    }

    for vector in slip10_vectors() {
        if !slip10_matches(&vector) {
            failures.push(vector.name);
        }
    }
    failures
}

fn slip10_matches(vector: &Slip10Vector) -> bool {
    let Ok(seed) = hex::decode(vector.seed_hex) else {
        return false;
    };
    let Ok(path) = vector.path.parse::<DerivationPath>() else {
        return false;
    };
    let Ok(secret) = derive_ed25519_secret(&seed, &path) else {
        return false;
    };
    let public = SolanaKeypair::from_secret(&secret).public_key_bytes();
    hex::encode(*secret) == vector.expected_secret && hex::encode(public) == vector.expected_public
}
