//! Custodial wallet records and the shape checks applied to wallet input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Accepted mnemonic lengths
pub const MNEMONIC_WORD_COUNTS: [usize; 3] = [12, 15, 24];

/// Unit string of the chain's native asset
pub const LOVELACE: &str = "lovelace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Preprod,
    Preview,
}

impl Network {
    /// Bech32 prefix a payment address on this network starts with
    pub fn address_prefix(self) -> &'static str {
        match self {
            Network::Mainnet => "addr1",
            Network::Preprod | Network::Preview => "addr_test1",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = WalletInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "preprod" => Ok(Network::Preprod),
            "preview" => Ok(Network::Preview),
            other => Err(WalletInputError::UnknownNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Network::Mainnet => "Mainnet",
            Network::Preprod => "Preprod",
            Network::Preview => "Preview",
        };
        write!(f, "{}", s)
    }
}

/// One wallet file on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub address: String,
    pub network: Network,
    /// `iv:authTag:ciphertext`, hex segments
    pub encrypted_mnemonic: String,
    pub owner_address: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a wallet; never carries secret material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub address: String,
    pub network: Network,
    pub created_at: DateTime<Utc>,
}

impl From<&WalletRecord> for WalletSummary {
    fn from(record: &WalletRecord) -> Self {
        Self {
            address: record.address.clone(),
            network: record.network,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WalletInputError {
    #[error("Mnemonic must have 12, 15 or 24 words, got {0}")]
    MnemonicWordCount(usize),
    #[error("Mnemonic words must be lowercase ascii letters")]
    MnemonicCharacters,
    #[error("Invalid address format: {0}")]
    InvalidAddress(String),
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
}

/// Normalize whitespace and check the word count of a mnemonic
pub fn normalize_mnemonic(mnemonic: &str) -> Result<String, WalletInputError> {
    let words: Vec<&str> = mnemonic.split_whitespace().collect();
    if !MNEMONIC_WORD_COUNTS.contains(&words.len()) {
        return Err(WalletInputError::MnemonicWordCount(words.len()));
    }
    if !words.iter().all(|w| w.chars().all(|c| c.is_ascii_lowercase())) {
        return Err(WalletInputError::MnemonicCharacters);
    }
    Ok(words.join(" "))
}

const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Shape check for a bech32 payment address (`addr1...` / `addr_test1...`)
pub fn validate_address(address: &str) -> Result<(), WalletInputError> {
    let data = address
        .strip_prefix("addr_test1")
        .or_else(|| address.strip_prefix("addr1"))
        .ok_or_else(|| WalletInputError::InvalidAddress(address.to_string()))?;

    if data.len() < 50 || data.len() > 110 || !data.chars().all(|c| BECH32_CHARSET.contains(c)) {
        return Err(WalletInputError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

/// File stem for a wallet record
pub fn fs_safe_name(address: &str) -> String {
    address
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// An amount of one asset in base units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub unit: String,
    pub quantity: u128,
}

/// Unspent output at an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: String,
    pub output_index: u32,
    pub amounts: Vec<AssetAmount>,
}

/// Sum every UTXO amount per asset unit
pub fn aggregate_balance(utxos: &[Utxo]) -> Vec<AssetAmount> {
    let mut totals: BTreeMap<&str, u128> = BTreeMap::new();
    for utxo in utxos {
        for amount in &utxo.amounts {
            *totals.entry(amount.unit.as_str()).or_default() += amount.quantity;
        }
    }

    // lovelace first, then the rest by unit
    let mut balance: Vec<AssetAmount> = totals
        .into_iter()
        .map(|(unit, quantity)| AssetAmount { unit: unit.to_string(), quantity })
        .collect();
    balance.sort_by_key(|a| a.unit != LOVELACE);
    balance
}
