//! ada-autotrader - Conditional strategy engine for Cardano DEX swaps
//!
//! Evaluates user strategies on a fixed cadence, turns met conditions into
//! trade orders, and executes pending orders as swaps signed with
//! server-held wallets.
//!
//! # Modules
//!
//! - `domain`: Core types (TradeOrder, wallet records, atomic persistence)
//! - `ports`: Trait abstractions (DexPort, ChainPort, OrderStore, StrategyStore, Notifier)
//! - `strategy`: Strategy state machines and the in-memory registry
//! - `custody`: Owner-scoped wallet encryption and storage
//! - `adapters`: External implementations (DEX API, chain gateway, store, notifiers, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Price oracle, scheduler, fulfilment loop, engine and service facade

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod custody;
pub mod adapters;
pub mod config;
pub mod application;
