//! ada-autotrader - Conditional strategy engine for Cardano DEX swaps

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use ada_autotrader::adapters::cli::{build_runtime, execute, CliApp};
use ada_autotrader::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets (wallet master secret, API keys) come from .env, not the config file
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let runtime = build_runtime(&config).await?;
    execute(app.command, runtime).await
}

/// `--debug` and `--verbose` override the configured level; `RUST_LOG` overrides both
fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).init();
    Ok(())
}
