use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::models::Pool;

/// Price oracle error type. Every variant is transient from the
/// scheduler's point of view: the evaluation is skipped and retried next tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    #[error("Pool {pool_id} does not pair {unit} with lovelace")]
    PoolMismatch { pool_id: String, unit: String },

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("DEX API error: {0}")]
    ApiError(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),
}

/// DEX pool data and swap simulation
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DexPort: Send + Sync {
    /// Fetch current reserves of a pool
    async fn get_pool_by_id(&self, pool_id: &str) -> Result<Pool, OracleError>;

    /// Decimals of an asset unit. Callers cache the result.
    async fn token_decimals(&self, unit: &str) -> Result<u8, OracleError>;

    /// Output amount for swapping `amount_in` against the given reserves
    fn simulate_swap(&self, amount_in: u128, reserve_in: u128, reserve_out: u128) -> u128;
}
