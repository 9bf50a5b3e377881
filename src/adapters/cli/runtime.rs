//! Wiring from `Config` to a running engine, and the command handlers

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use super::commands::{Command, OrdersAction, RunCmd, StrategiesAction, WalletAction};
use crate::adapters::chain::{ChainGatewayClient, ChainGatewayConfig};
use crate::adapters::dex::{DexClient, DexConfig};
use crate::adapters::notify::{BroadcastNotifier, FanoutNotifier, WebhookNotifier};
use crate::adapters::store::MemoryStore;
use crate::application::{ApiResponse, Engine, TradingService};
use crate::config::Config;
use crate::custody::{KeyDeriver, WalletStore};
use crate::ports::{ChainPort, DexPort};

/// Engine plus the in-process event channel it publishes to
pub struct Runtime {
    pub engine: Arc<Engine>,
    pub service: TradingService,
    pub events: BroadcastNotifier,
}

/// Build every adapter named in `config` and assemble the engine
pub async fn build_runtime(config: &Config) -> Result<Runtime> {
    let dex = DexClient::with_config(DexConfig {
        api_base_url: config.dex.api_url.clone(),
        api_key: config.dex.get_api_key(),
        fee_bps: config.dex.fee_bps,
        timeout: config.dex.timeout(),
        max_retries: config.dex.max_retries,
    })
    .context("Failed to create DEX client")?;

    let chain: Arc<dyn ChainPort> = Arc::new(
        ChainGatewayClient::with_config(ChainGatewayConfig {
            api_base_url: config.chain.get_gateway_url(),
            api_key: config.chain.get_api_key(),
            timeout: config.chain.timeout(),
            max_retries: config.chain.max_retries,
        })
        .context("Failed to create chain gateway client")?,
    );

    let deriver = KeyDeriver::new(
        config.custody.master_secret().context("Wallet master secret unavailable")?,
        config.custody.kdf_iterations,
    )
    .context("Failed to set up key derivation")?;

    let custody = Arc::new(WalletStore::new(
        config.custody.wallet_dir(),
        config.custody.network()?,
        deriver,
        chain.clone(),
    ));

    let store = Arc::new(match config.store.snapshot_path() {
        Some(path) => MemoryStore::open(&path)
            .await
            .with_context(|| format!("Failed to open store snapshot {}", path.display()))?,
        None => {
            tracing::warn!("No store snapshot configured; strategies and orders are not persisted");
            MemoryStore::new()
        }
    });

    let events = BroadcastNotifier::new(config.alerts.channel_capacity);
    let mut notifier = FanoutNotifier::new().with(Arc::new(events.clone()));
    if config.alerts.webhook_enabled {
        let webhook = WebhookNotifier::new(config.alerts.webhook_url.clone())
            .context("Failed to create webhook notifier")?;
        notifier = notifier.with(Arc::new(webhook));
    }

    let dex: Arc<dyn DexPort> = Arc::new(dex);
    let engine = Arc::new(Engine::new(
        config.engine_settings(),
        dex,
        chain,
        store.clone(),
        store,
        custody,
        Arc::new(notifier),
    ));

    Ok(Runtime {
        service: TradingService::new(engine.clone()),
        engine,
        events,
    })
}

/// Dispatch a parsed command against an assembled runtime
pub async fn execute(command: Command, runtime: Runtime) -> Result<()> {
    let service = &runtime.service;

    match command {
        Command::Run(cmd) => run(cmd, &runtime).await,
        Command::Wallet(cmd) => match cmd.action {
            WalletAction::Create { owner } => print(&service.create_wallet(&owner.owner).await),
            WalletAction::Import { owner, mnemonic_file } => {
                let mnemonic = read_mnemonic(mnemonic_file.as_deref())?;
                print(&service.import_wallet(&owner.owner, &mnemonic).await)
            }
            WalletAction::List { owner } => print(&service.list_wallets(&owner.owner).await),
            WalletAction::Verify { owner, wallet } => {
                print(&service.verify_ownership(&owner.owner, &wallet).await)
            }
            WalletAction::Balance { owner, wallet } => {
                print(&service.get_balance(&owner.owner, &wallet).await)
            }
        },
        Command::Orders(cmd) => match cmd.action {
            OrdersAction::List { owner, wallet } => {
                print(&service.list_orders(&owner.owner, wallet.as_deref()).await)
            }
            OrdersAction::Retry { owner, id } => print(&service.retry_order(&owner.owner, &id).await),
        },
        Command::Strategies(cmd) => match cmd.action {
            StrategiesAction::List { owner } => print(&service.list_strategies(&owner.owner).await),
        },
    }
}

async fn run(cmd: RunCmd, runtime: &Runtime) -> Result<()> {
    let engine = runtime.engine.clone();

    if cmd.once {
        let loaded = engine.run_once().await.context("Single pass failed")?;
        tracing::info!("Single pass complete ({} strategies loaded)", loaded);
        return Ok(());
    }

    let loaded = engine.start().await.context("Failed to start engine")?;
    tracing::info!(
        "Engine running with {} strategies (strategy tick {:?}, order tick {:?})",
        loaded,
        engine.settings().strategy_interval,
        engine.settings().order_interval
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Shutdown signal received");

    engine.stop().await;
    tracing::info!("Engine stopped");
    Ok(())
}

fn read_mnemonic(file: Option<&Path>) -> Result<String> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mnemonic file {}", path.display()))?,
        None => {
            eprintln!("Enter mnemonic, then press Ctrl+D:");
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read mnemonic from stdin")?;
            buf
        }
    };
    Ok(raw.trim().to_string())
}

fn print<T: Serialize>(response: &ApiResponse<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    if !response.success {
        anyhow::bail!(response.error.clone().unwrap_or_else(|| "request failed".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_mnemonic_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.txt");
        std::fs::write(&path, "  abandon ability able\n").unwrap();
        assert_eq!(read_mnemonic(Some(&path)).unwrap(), "abandon ability able");
    }

    #[test]
    fn test_read_mnemonic_missing_file() {
        assert!(read_mnemonic(Some(Path::new("/nonexistent/seed.txt"))).is_err());
    }

    #[test]
    fn test_print_failure_is_error() {
        assert!(print(&ApiResponse::ok(1)).is_ok());
        assert!(print(&ApiResponse::<()>::err("wallet not owned")).is_err());
    }

    #[tokio::test]
    async fn test_build_runtime_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
[custody]
wallet_dir = "{wallets}"
network = "preprod"
master_secret_env = "ADA_AUTOTRADER_RUNTIME_SECRET"
kdf_iterations = 1000

[store]
snapshot_path = "{state}"
"#,
            wallets = dir.path().join("wallets").display(),
            state = dir.path().join("state.json").display()
        );
        let config: Config = toml::from_str(&toml).unwrap();
        config.validate().unwrap();

        std::env::set_var("ADA_AUTOTRADER_RUNTIME_SECRET", "runtime test secret");
        let runtime = build_runtime(&config).await.unwrap();
        std::env::remove_var("ADA_AUTOTRADER_RUNTIME_SECRET");

        assert_eq!(runtime.engine.settings().slippage_bps, 100);
        assert!(!runtime.engine.is_running().await);
        assert_eq!(runtime.events.subscriber_count(), 0);
    }
}
