//! Domain Layer - Core types for the strategy engine
//!
//! Pure domain types and rules with no external I/O beyond file persistence.
//! All external interactions happen through the ports layer.
//!
//! - `order`: trade orders and their status lifecycle
//! - `wallet`: custodial wallet records, mnemonic/address shape checks, balances
//! - `persistence`: atomic JSON file replacement

pub mod order;
pub mod wallet;
pub mod persistence;

pub use order::{
    Market, OrderError, OrderIntent, OrderSide, OrderStatus, TradeOrder, TriggerDirection,
};
pub use wallet::{
    aggregate_balance, fs_safe_name, normalize_mnemonic, validate_address, AssetAmount, Network,
    Utxo, WalletInputError, WalletRecord, WalletSummary, LOVELACE,
};
pub use persistence::PersistError;
