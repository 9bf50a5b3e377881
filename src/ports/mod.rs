//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - DEX pool data and swap simulation (`market_data`)
//! - Chain queries, signing and submission (`execution`)
//! - Strategy and order persistence (`store`)
//! - The real-time notification channel (`notify`)

pub mod market_data;
pub mod execution;
pub mod store;
pub mod notify;
pub mod models;
pub mod mocks;

pub use market_data::{DexPort, OracleError};
pub use execution::{ChainError, ChainPort};
pub use store::{OrderStore, StoreError, StrategyStore};
pub use notify::{EngineEvent, Notifier, OrderStep};
pub use models::{Pool, SigningContext, SwapTransaction, TransferRequest};
