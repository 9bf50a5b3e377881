//! DEX Adapter
//!
//! Pool reserves and asset decimals over HTTP, constant-product swap pricing.

mod client;

pub use client::{constant_product_out, DexClient, DexConfig, DEFAULT_DEX_API, DEFAULT_FEE_BPS};
