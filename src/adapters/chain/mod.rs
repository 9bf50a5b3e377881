//! Chain Adapter
//!
//! Wallet gateway client: mnemonic generation, address derivation, UTXO
//! queries, and signed swap/transfer submission.

mod client;

pub use client::{ChainGatewayClient, ChainGatewayConfig, DEFAULT_GATEWAY_URL};
