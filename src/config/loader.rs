//! Configuration Loader
//!
//! Loads and validates the engine configuration from a TOML file.
//! Secrets never live in the file: the wallet master secret and API keys
//! are read from the environment (populated from `.env` by the binary).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::Network;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    pub custody: CustodySection,
    #[serde(default)]
    pub dex: DexSection,
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub alerts: AlertsSection,
}

/// Loop cadence and execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Seconds between strategy evaluation ticks
    #[serde(default = "default_strategy_interval")]
    pub strategy_interval_secs: u64,
    /// Seconds between order fulfilment ticks
    #[serde(default = "default_order_interval")]
    pub order_interval_secs: u64,
    /// Slippage tolerance applied to every swap (100 = 1%)
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
}

fn default_strategy_interval() -> u64 {
    30
}

fn default_order_interval() -> u64 {
    10
}

fn default_slippage_bps() -> u16 {
    100
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            strategy_interval_secs: default_strategy_interval(),
            order_interval_secs: default_order_interval(),
            slippage_bps: default_slippage_bps(),
        }
    }
}

/// Wallet custody section
#[derive(Debug, Clone, Deserialize)]
pub struct CustodySection {
    /// Directory holding one encrypted JSON file per wallet (`~` allowed)
    pub wallet_dir: String,
    /// "mainnet", "preprod" or "preview"
    pub network: String,
    /// Name of the env var holding the master secret
    #[serde(default = "default_master_secret_env")]
    pub master_secret_env: String,
    /// PBKDF2 iterations for per-owner key derivation
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

fn default_master_secret_env() -> String {
    "WALLET_MASTER_SECRET".to_string()
}

fn default_kdf_iterations() -> u32 {
    crate::custody::DEFAULT_KDF_ITERATIONS
}

impl CustodySection {
    pub fn wallet_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.wallet_dir).to_string())
    }

    pub fn network(&self) -> Result<Network, ConfigError> {
        self.network
            .parse()
            .map_err(|e: crate::domain::WalletInputError| ConfigError::ValidationError(e.to_string()))
    }

    /// Master secret from the configured env var
    pub fn master_secret(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.master_secret_env) {
            Ok(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(ConfigError::MissingSecret(self.master_secret_env.clone())),
        }
    }
}

/// DEX pool API section
#[derive(Debug, Clone, Deserialize)]
pub struct DexSection {
    #[serde(default = "default_dex_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Pool swap fee used for simulation (30 = 0.3%)
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_dex_url() -> String {
    crate::adapters::dex::DEFAULT_DEX_API.to_string()
}

fn default_fee_bps() -> u32 {
    crate::adapters::dex::DEFAULT_FEE_BPS
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for DexSection {
    fn default() -> Self {
        Self {
            api_url: default_dex_url(),
            api_key: None,
            fee_bps: default_fee_bps(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl DexSection {
    /// API key with environment variable fallback (`DEX_API_KEY`)
    pub fn get_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone()).or_else(|| non_empty(std::env::var("DEX_API_KEY").ok()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Wallet gateway section
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_gateway_url() -> String {
    crate::adapters::chain::DEFAULT_GATEWAY_URL.to_string()
}

fn default_gateway_timeout() -> u64 {
    60
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            api_key: None,
            timeout_secs: default_gateway_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ChainSection {
    /// Gateway URL, overridden by `CHAIN_GATEWAY_URL` when set
    pub fn get_gateway_url(&self) -> String {
        std::env::var("CHAIN_GATEWAY_URL").unwrap_or_else(|_| self.gateway_url.clone())
    }

    /// API key with environment variable fallback (`CHAIN_GATEWAY_API_KEY`)
    pub fn get_api_key(&self) -> Option<String> {
        non_empty(self.api_key.clone())
            .or_else(|| non_empty(std::env::var("CHAIN_GATEWAY_API_KEY").ok()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Strategy and order persistence
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSection {
    /// JSON snapshot of strategies and orders; in-memory only when unset
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

impl StoreSection {
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Alerts configuration section (optional)
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsSection {
    /// Buffer of the in-process event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// POST every engine event to `webhook_url`
    #[serde(default)]
    pub webhook_enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            webhook_enabled: false,
            webhook_url: String::new(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Environment variable {0} is not set")]
    MissingSecret(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.strategy_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "strategy_interval_secs must be > 0".to_string(),
            ));
        }

        if self.engine.order_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "order_interval_secs must be > 0".to_string(),
            ));
        }

        if self.engine.slippage_bps >= 10_000 {
            return Err(ConfigError::ValidationError(format!(
                "slippage_bps must be < 10000, got {}",
                self.engine.slippage_bps
            )));
        }

        if self.custody.wallet_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "wallet_dir cannot be empty".to_string(),
            ));
        }

        self.custody.network()?;

        if self.custody.master_secret_env.is_empty() {
            return Err(ConfigError::ValidationError(
                "master_secret_env cannot be empty".to_string(),
            ));
        }

        if self.custody.kdf_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "kdf_iterations must be > 0".to_string(),
            ));
        }

        if self.dex.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "dex api_url cannot be empty".to_string(),
            ));
        }

        if self.dex.fee_bps >= 10_000 {
            return Err(ConfigError::ValidationError(format!(
                "fee_bps must be < 10000, got {}",
                self.dex.fee_bps
            )));
        }

        if self.chain.gateway_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "gateway_url cannot be empty".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging level must be one of {:?}, got {}",
                LOG_LEVELS, self.logging.level
            )));
        }

        if self.alerts.webhook_enabled && self.alerts.webhook_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "webhook_url is required when webhook_enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn engine_settings(&self) -> crate::application::EngineSettings {
        crate::application::EngineSettings {
            strategy_interval: Duration::from_secs(self.engine.strategy_interval_secs),
            order_interval: Duration::from_secs(self.engine.order_interval_secs),
            slippage_bps: self.engine.slippage_bps,
        }
    }
}
