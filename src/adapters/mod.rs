//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - DEX: pool reserves and asset metadata over HTTP
//! - Chain: wallet gateway for key derivation, UTXOs and signed submission
//! - Store: in-memory strategy/order store with JSON snapshots
//! - Notify: broadcast channel, webhook and fan-out notifiers
//! - CLI: Command-line interface and runtime wiring

pub mod http;
pub mod dex;
pub mod chain;
pub mod store;
pub mod notify;
pub mod cli;

pub use dex::DexClient;
pub use chain::ChainGatewayClient;
pub use store::MemoryStore;
pub use notify::{BroadcastNotifier, FanoutNotifier, WebhookNotifier};
pub use cli::CliApp;
