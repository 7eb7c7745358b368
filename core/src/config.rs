//! Per-network constants: Base58Check version bytes, P2P magic, and default
//! port. Generalizes the builder-pattern config of a single-network chain
//! to Bitcoin's two public networks.

use serde::{Deserialize, Serialize};

/// Which Bitcoin network a set of wire-format constants applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet3,
}

impl Network {
    /// Base58Check version byte for P2PKH addresses.
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet3 => 0x6f,
        }
    }

    /// Base58Check version byte for P2SH addresses.
    pub fn p2sh_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet3 => 0xc4,
        }
    }

    /// WIF version byte for private keys.
    pub fn wif_version(self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet3 => 0xef,
        }
    }

    /// 4-byte magic prefixing every P2P message envelope, little-endian on
    /// the wire.
    pub fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => 0xd9b4bef9u32.to_le_bytes(),
            Network::Testnet3 => 0x0709110bu32.to_le_bytes(),
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet3 => 18333,
        }
    }

    pub fn is_testnet(self) -> bool {
        matches!(self, Network::Testnet3)
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}
