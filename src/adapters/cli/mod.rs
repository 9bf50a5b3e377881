//! CLI Adapter
//!
//! Command-line interface for the engine and its wallet/order operations.
//! Uses clap derive macros for argument parsing.

mod commands;
mod runtime;

pub use commands::{
    CliApp, Command, OrdersAction, OrdersCmd, OwnerArg, RunCmd, StrategiesAction, StrategiesCmd,
    WalletAction, WalletCmd,
};
pub use runtime::{build_runtime, execute, Runtime};
