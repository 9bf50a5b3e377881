//! Common data structures shared by the port traits

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{AssetAmount, Network};

/// Liquidity pool reserves as reported by the DEX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub pool_id: String,
    /// Unit of asset A (`lovelace` for ADA pools)
    pub asset_a: String,
    /// Unit of asset B
    pub asset_b: String,
    /// Reserve of asset A in base units
    pub reserve_a: u128,
    /// Reserve of asset B in base units
    pub reserve_b: u128,
}

impl Pool {
    /// Reserves ordered as (reserve of `unit`, reserve of the other asset)
    pub fn reserves_for(&self, unit: &str) -> Option<(u128, u128)> {
        if self.asset_a == unit {
            Some((self.reserve_a, self.reserve_b))
        } else if self.asset_b == unit {
            Some((self.reserve_b, self.reserve_a))
        } else {
            None
        }
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.asset_a == unit || self.asset_b == unit
    }
}

/// A swap ready to be built, signed and submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTransaction {
    pub pool_id: String,
    pub sender: String,
    pub asset_in: String,
    pub asset_out: String,
    /// Amount of `asset_in` in base units
    pub amount_in: u128,
    /// Minimum acceptable `asset_out` after slippage, base units
    pub min_amount_out: u128,
}

/// Transfer of selected assets out of a custodial wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub assets: Vec<AssetAmount>,
}

/// Decrypted signing material for one wallet.
///
/// Only the custody store constructs this.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub address: String,
    pub network: Network,
    mnemonic: String,
}

impl SigningContext {
    pub(crate) fn new(address: String, network: Network, mnemonic: String) -> Self {
        Self { address, network, mnemonic }
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("address", &self.address)
            .field("network", &self.network)
            .field("mnemonic", &"***")
            .finish()
    }
}
