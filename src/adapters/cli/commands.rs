//! CLI Command Definitions
//!
//! Every command prints the same JSON envelope the routing layer receives.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ada-autotrader - Conditional strategy engine for Cardano DEX swaps
#[derive(Parser, Debug)]
#[command(
    name = "ada-autotrader",
    version = env!("CARGO_PKG_VERSION"),
    about = "Conditional strategy engine for Cardano DEX swaps from custodial wallets",
    long_about = "ada-autotrader evaluates price-target, accumulation, grid and \
                  stop-loss/take-profit strategies on a fixed cadence and executes \
                  the resulting swaps from server-held wallets."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/engine.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start both engine loops until Ctrl+C
    Run(RunCmd),

    /// Manage custodial wallets
    Wallet(WalletCmd),

    /// Inspect and retry trade orders
    Orders(OrdersCmd),

    /// Inspect strategies
    Strategies(StrategiesCmd),
}

#[derive(Args, Debug)]
pub struct RunCmd {
    /// Run a single strategy tick and a single order tick, then exit
    #[arg(long)]
    pub once: bool,
}

/// Authenticated owner (the user's own payment address)
#[derive(Args, Debug, Clone)]
pub struct OwnerArg {
    #[arg(long, value_name = "ADDRESS")]
    pub owner: String,
}

#[derive(Args, Debug)]
pub struct WalletCmd {
    #[command(subcommand)]
    pub action: WalletAction,
}

#[derive(Subcommand, Debug)]
pub enum WalletAction {
    /// Generate a new wallet; the mnemonic is shown once
    Create {
        #[command(flatten)]
        owner: OwnerArg,
    },
    /// Import an existing mnemonic (read from FILE or stdin)
    Import {
        #[command(flatten)]
        owner: OwnerArg,
        #[arg(long, value_name = "FILE")]
        mnemonic_file: Option<PathBuf>,
    },
    /// List wallets owned by the owner
    List {
        #[command(flatten)]
        owner: OwnerArg,
    },
    /// Check whether the owner controls a wallet
    Verify {
        #[command(flatten)]
        owner: OwnerArg,
        #[arg(value_name = "WALLET")]
        wallet: String,
    },
    /// Aggregated on-chain balance of a wallet
    Balance {
        #[command(flatten)]
        owner: OwnerArg,
        #[arg(value_name = "WALLET")]
        wallet: String,
    },
}

#[derive(Args, Debug)]
pub struct OrdersCmd {
    #[command(subcommand)]
    pub action: OrdersAction,
}

#[derive(Subcommand, Debug)]
pub enum OrdersAction {
    /// List orders of the owner's wallets, newest first
    List {
        #[command(flatten)]
        owner: OwnerArg,
        /// Restrict to one wallet
        #[arg(long, value_name = "WALLET")]
        wallet: Option<String>,
    },
    /// Move a failed order back to pending
    Retry {
        #[command(flatten)]
        owner: OwnerArg,
        #[arg(value_name = "ORDER_ID")]
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct StrategiesCmd {
    #[command(subcommand)]
    pub action: StrategiesAction,
}

#[derive(Subcommand, Debug)]
pub enum StrategiesAction {
    /// List the owner's strategies with live prices
    List {
        #[command(flatten)]
        owner: OwnerArg,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const OWNER: &str = "addr_test1qxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

    #[test]
    fn test_cli_definition_is_valid() {
        CliApp::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let app = CliApp::try_parse_from(["ada-autotrader", "run", "--once", "-c", "engine.toml"]).unwrap();
        assert_eq!(app.config, PathBuf::from("engine.toml"));
        assert!(matches!(app.command, Command::Run(RunCmd { once: true })));
    }

    #[test]
    fn test_parse_wallet_balance() {
        let app = CliApp::try_parse_from([
            "ada-autotrader", "--debug", "wallet", "balance", "--owner", OWNER, "addr_test1wallet",
        ])
        .unwrap();
        assert!(app.debug);
        match app.command {
            Command::Wallet(WalletCmd { action: WalletAction::Balance { owner, wallet } }) => {
                assert_eq!(owner.owner, OWNER);
                assert_eq!(wallet, "addr_test1wallet");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_orders_list_with_wallet() {
        let app = CliApp::try_parse_from([
            "ada-autotrader", "orders", "list", "--owner", OWNER, "--wallet", "addr_test1w",
        ])
        .unwrap();
        assert!(matches!(
            app.command,
            Command::Orders(OrdersCmd { action: OrdersAction::List { wallet: Some(_), .. } })
        ));
    }

    #[test]
    fn test_owner_is_required() {
        assert!(CliApp::try_parse_from(["ada-autotrader", "wallet", "list"]).is_err());
    }
}
