//! Price Oracle
//!
//! Derives ADA-per-token prices from DEX pool reserves and sizes swaps.
//! Token decimals are fetched once per unit and cached for the life of the
//! process.

use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{OrderSide, LOVELACE};
use crate::ports::{DexPort, OracleError, Pool};

const ADA_DECIMALS: u8 = 6;
/// Largest power of ten `Decimal` represents
const MAX_DECIMALS: u8 = 28;
const BPS_DENOMINATOR: u128 = 10_000;

/// Sized swap ready to hand to the chain port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub pool_id: String,
    pub asset_in: String,
    pub asset_out: String,
    /// Base units of `asset_in`
    pub amount_in: u128,
    /// Simulated base units of `asset_out`
    pub expected_out: u128,
    /// `expected_out` less slippage tolerance
    pub min_out: u128,
}

pub struct PriceOracle {
    dex: Arc<dyn DexPort>,
    decimals: RwLock<HashMap<String, u8>>,
}

fn unit_scale(decimals: u8) -> Result<Decimal, OracleError> {
    (0..decimals)
        .try_fold(Decimal::ONE, |acc, _| acc.checked_mul(Decimal::TEN))
        .ok_or_else(|| OracleError::ParseError(format!("decimals {} out of range", decimals)))
}

/// Human amount to base units, rounded down
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u128, OracleError> {
    let amount = Decimal::from_f64(amount)
        .filter(|a| a.is_sign_positive() && !a.is_zero())
        .ok_or_else(|| OracleError::ParseError(format!("invalid amount {}", amount)))?;
    amount
        .checked_mul(unit_scale(decimals)?)
        .map(|v| v.floor())
        .and_then(|v| v.to_u128())
        .filter(|v| *v > 0)
        .ok_or_else(|| OracleError::ParseError(format!("amount {} out of range", amount)))
}

impl PriceOracle {
    pub fn new(dex: Arc<dyn DexPort>) -> Self {
        Self {
            dex,
            decimals: RwLock::new(HashMap::new()),
        }
    }

    /// Decimals of `unit`, cached indefinitely after the first lookup
    pub async fn decimals(&self, unit: &str) -> Result<u8, OracleError> {
        if unit == LOVELACE {
            return Ok(ADA_DECIMALS);
        }
        if let Some(d) = self.decimals.read().await.get(unit) {
            return Ok(*d);
        }

        let fetched = self.dex.token_decimals(unit).await?;
        if fetched > MAX_DECIMALS {
            return Err(OracleError::ParseError(format!("{} reports {} decimals", unit, fetched)));
        }
        tracing::debug!("Cached decimals for {}: {}", unit, fetched);
        self.decimals.write().await.insert(unit.to_string(), fetched);
        Ok(fetched)
    }

    async fn pool_for(&self, pool_id: &str, base_token: &str) -> Result<Pool, OracleError> {
        let pool = self.dex.get_pool_by_id(pool_id).await?;
        if !pool.contains(base_token) || !pool.contains(LOVELACE) {
            return Err(OracleError::PoolMismatch {
                pool_id: pool_id.to_string(),
                unit: base_token.to_string(),
            });
        }
        Ok(pool)
    }

    /// ADA received for swapping one whole `base_token` in `pool_id`
    pub async fn price(&self, pool_id: &str, base_token: &str) -> Result<f64, OracleError> {
        let pool = self.pool_for(pool_id, base_token).await?;
        let decimals = self.decimals(base_token).await?;
        let (reserve_in, reserve_out) = pool
            .reserves_for(base_token)
            .ok_or_else(|| OracleError::PriceUnavailable(pool_id.to_string()))?;
        if reserve_in == 0 || reserve_out == 0 {
            return Err(OracleError::PriceUnavailable(format!("{} has empty reserves", pool_id)));
        }

        let one_token = unit_scale(decimals)?
            .to_u128()
            .ok_or_else(|| OracleError::ParseError(format!("decimals {} out of range", decimals)))?;
        let lovelace_out = self.dex.simulate_swap(one_token, reserve_in, reserve_out);

        let ada_scale = unit_scale(ADA_DECIMALS)?;
        let price = Decimal::from_u128(lovelace_out)
            .map(|v| v / ada_scale)
            .and_then(|v| v.to_f64())
            .ok_or_else(|| OracleError::ParseError(format!("swap output {} out of range", lovelace_out)))?;
        if price <= 0.0 {
            return Err(OracleError::PriceUnavailable(pool_id.to_string()));
        }
        Ok(price)
    }

    /// Size a swap for an order. A BUY spends `amount` ADA; a SELL sells
    /// `amount` base tokens.
    pub async fn quote_swap(
        &self,
        pool_id: &str,
        base_token: &str,
        side: OrderSide,
        amount: f64,
        slippage_bps: u16,
    ) -> Result<SwapQuote, OracleError> {
        let pool = self.pool_for(pool_id, base_token).await?;
        let (asset_in, asset_out) = match side {
            OrderSide::Buy => (LOVELACE, base_token),
            OrderSide::Sell => (base_token, LOVELACE),
        };

        let amount_in = to_base_units(amount, self.decimals(asset_in).await?)?;
        let (reserve_in, reserve_out) = pool
            .reserves_for(asset_in)
            .ok_or_else(|| OracleError::PriceUnavailable(pool_id.to_string()))?;
        let expected_out = self.dex.simulate_swap(amount_in, reserve_in, reserve_out);
        if expected_out == 0 {
            return Err(OracleError::PriceUnavailable(format!("{} returns nothing for {}", pool_id, amount_in)));
        }

        let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps as u128);
        let min_out = expected_out / BPS_DENOMINATOR * keep + expected_out % BPS_DENOMINATOR * keep / BPS_DENOMINATOR;

        Ok(SwapQuote {
            pool_id: pool_id.to_string(),
            asset_in: asset_in.to_string(),
            asset_out: asset_out.to_string(),
            amount_in,
            expected_out,
            min_out,
        })
    }
}
