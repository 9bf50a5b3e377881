//! DEX pool API client
//!
//! Reads pool reserves and asset metadata from a Cardano indexer that
//! exposes `GET /pools/{id}` and `GET /assets/{unit}`, and prices swaps
//! locally with the constant-product formula.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::adapters::http::{read_json, send_with_retry, HttpError};
use crate::ports::{DexPort, OracleError, Pool};

/// Default pool-data API endpoint
pub const DEFAULT_DEX_API: &str = "https://api-mainnet-prod.minswap.org";

/// Swap fee charged by a standard constant-product pool (0.3%)
pub const DEFAULT_FEE_BPS: u32 = 30;

#[derive(Debug, Clone)]
pub struct DexConfig {
    pub api_base_url: String,
    /// Sent as the `project_id` header when present
    pub api_key: Option<String>,
    pub fee_bps: u32,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for DexConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_DEX_API.to_string(),
            api_key: None,
            fee_bps: DEFAULT_FEE_BPS,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolResponse {
    pool_id: String,
    asset_a: String,
    asset_b: String,
    reserve_a: String,
    reserve_b: String,
}

impl TryFrom<PoolResponse> for Pool {
    type Error = OracleError;

    fn try_from(raw: PoolResponse) -> Result<Self, Self::Error> {
        let parse = |field: &str, value: &str| {
            value
                .parse::<u128>()
                .map_err(|e| OracleError::ParseError(format!("{} '{}': {}", field, value, e)))
        };
        Ok(Pool {
            reserve_a: parse("reserveA", &raw.reserve_a)?,
            reserve_b: parse("reserveB", &raw.reserve_b)?,
            pool_id: raw.pool_id,
            asset_a: raw.asset_a,
            asset_b: raw.asset_b,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    #[serde(default)]
    metadata: Option<AssetMetadata>,
}

#[derive(Debug, Deserialize)]
struct AssetMetadata {
    #[serde(default)]
    decimals: Option<u8>,
}

/// HTTP implementation of [`DexPort`]
#[derive(Clone)]
pub struct DexClient {
    client: Client,
    config: DexConfig,
}

impl DexClient {
    pub fn new() -> Result<Self, OracleError> {
        Self::with_config(DexConfig::default())
    }

    pub fn with_config(config: DexConfig) -> Result<Self, OracleError> {
        if config.fee_bps >= 10_000 {
            return Err(OracleError::ApiError(format!("fee_bps must be < 10000, got {}", config.fee_bps)));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::ApiError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &DexConfig {
        &self.config
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, HttpError> {
        let url = format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.header("project_id", key);
        }

        tracing::debug!("GET {}", url);
        let response = send_with_retry(request, self.config.max_retries).await?;
        read_json(response).await
    }
}

fn oracle_error(err: HttpError) -> OracleError {
    match err {
        HttpError::Decode(msg) => OracleError::ParseError(msg),
        other => OracleError::ApiError(other.to_string()),
    }
}

/// `amount_in * (1 - fee) * reserve_out / (reserve_in + amount_in * (1 - fee))`,
/// floored. Zero when either reserve is empty or the product overflows.
pub fn constant_product_out(amount_in: u128, reserve_in: u128, reserve_out: u128, fee_bps: u32) -> u128 {
    if reserve_in == 0 || reserve_out == 0 || amount_in == 0 {
        return 0;
    }
    let fee_factor = 10_000u128.saturating_sub(fee_bps as u128);
    let out = amount_in
        .checked_mul(fee_factor)
        .and_then(|in_with_fee| {
            let numerator = in_with_fee.checked_mul(reserve_out)?;
            let denominator = reserve_in.checked_mul(10_000)?.checked_add(in_with_fee)?;
            Some(numerator / denominator)
        });

    out.unwrap_or_else(|| {
        tracing::warn!("Swap simulation overflowed for amount_in {}", amount_in);
        0
    })
}

#[async_trait]
impl DexPort for DexClient {
    async fn get_pool_by_id(&self, pool_id: &str) -> Result<Pool, OracleError> {
        let raw: PoolResponse = self
            .get_json(&format!("pools/{}", pool_id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    OracleError::PoolNotFound(pool_id.to_string())
                } else {
                    oracle_error(e)
                }
            })?;
        raw.try_into()
    }

    async fn token_decimals(&self, unit: &str) -> Result<u8, OracleError> {
        let asset: AssetResponse = self
            .get_json(&format!("assets/{}", unit))
            .await
            .map_err(oracle_error)?;

        // Tokens without registered metadata trade in whole units
        Ok(asset.metadata.and_then(|m| m.decimals).unwrap_or(0))
    }

    fn simulate_swap(&self, amount_in: u128, reserve_in: u128, reserve_out: u128) -> u128 {
        constant_product_out(amount_in, reserve_in, reserve_out, self.config.fee_bps)
    }
}
