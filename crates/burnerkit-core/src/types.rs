//! Strong type definitions shared across burnerkit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cipher::EncryptedSecret;

/// A concrete network a burner can be used on.
///
/// EVM networks are aliases of one another: they share an index sequence
/// and the same derived address per index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Solana,
    Ethereum,
    Avalanche,
    Arbitrum,
}

impl Network {
    /// All supported networks.
    pub const ALL: [Network; 4] = [
        Network::Solana,
        Network::Ethereum,
        Network::Avalanche,
        Network::Arbitrum,
    ];

    /// The derivation family this network belongs to.
    pub const fn family(self) -> NetworkFamily {
        match self {
            Network::Solana => NetworkFamily::Solana,
            Network::Ethereum | Network::Avalanche | Network::Arbitrum => NetworkFamily::Evm,
        }
    }

    /// EIP-155 chain id, for EVM networks.
    pub const fn chain_id(self) -> Option<u64> {
        match self {
            Network::Solana => None,
            Network::Ethereum => Some(1),
            Network::Avalanche => Some(43_114),
            Network::Arbitrum => Some(42_161),
        }
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Network::Solana => "solana",
            Network::Ethereum => "ethereum",
            Network::Avalanche => "avalanche",
            Network::Arbitrum => "arbitrum",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "solana" => Ok(Network::Solana),
            "ethereum" => Ok(Network::Ethereum),
            "avalanche" => Ok(Network::Avalanche),
            "arbitrum" => Ok(Network::Arbitrum),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// A derivation family: one index sequence, one curve, one path scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkFamily {
    /// Ed25519, SLIP-0010 path `m/44'/501'/index'/0'`.
    Solana,
    /// secp256k1, BIP32 path `m/44'/60'/0'/0/index`.
    Evm,
}

impl NetworkFamily {
    /// Key prefix used in the persisted keyspace.
    pub const fn as_str(self) -> &'static str {
        match self {
            NetworkFamily::Solana => "solana",
            NetworkFamily::Evm => "evm",
        }
    }

    /// The network used when a family has to be shown as one network.
    pub const fn primary_network(self) -> Network {
        match self {
            NetworkFamily::Solana => Network::Solana,
            NetworkFamily::Evm => Network::Ethereum,
        }
    }
}

impl fmt::Display for NetworkFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Network> for NetworkFamily {
    fn from(network: Network) -> Self {
        network.family()
    }
}

/// What the master secret of a vault actually is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportMode {
    /// A BIP39 mnemonic phrase.
    Seed,
    /// A Solana private key imported at onboarding.
    ImportedSolanaKey,
    /// An Ethereum private key imported at onboarding.
    ImportedEthereumKey,
}

impl ImportMode {
    /// The family whose index 0 is the imported key, if any.
    pub const fn imported_family(self) -> Option<NetworkFamily> {
        match self {
            ImportMode::Seed => None,
            ImportMode::ImportedSolanaKey => Some(NetworkFamily::Solana),
            ImportMode::ImportedEthereumKey => Some(NetworkFamily::Evm),
        }
    }
}

/// The single encrypted master secret of an installation.
///
/// Created at onboarding and never destroyed; locking only drops the
/// in-memory password. Re-encryption under a new password is not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterVault {
    /// The encrypted master secret (mnemonic phrase or normalized private key).
    pub secret: EncryptedSecret,
    /// How to interpret the decrypted secret.
    pub import_mode: ImportMode,
    /// When the vault was created (Unix ms).
    pub created_at: i64,
}
