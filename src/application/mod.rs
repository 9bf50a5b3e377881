//! Application Layer - Engine, periodic loops and the service facade
//!
//! - `oracle`: prices and swap sizing over the DEX port
//! - `ticker`: single-flight periodic task runner
//! - `scheduler`: strategy evaluation loop
//! - `fulfilment`: pending-order execution loop
//! - `engine`: owner of the registry, loops and collaborators
//! - `service`: JSON-envelope facade for the routing layer

pub mod error;
pub mod oracle;
pub mod ticker;
pub mod scheduler;
pub mod fulfilment;
pub mod engine;
pub mod service;

pub use error::EngineError;
pub use oracle::{PriceOracle, SwapQuote};
pub use ticker::{Periodic, TickGuard, Ticker};
pub use scheduler::{SchedulerReport, StrategyScheduler};
pub use fulfilment::{FulfilmentLoop, FulfilmentReport, OrderOutcome};
pub use engine::{Engine, EngineSettings, NewStrategy};
pub use service::{
    ApiResponse, Balance, CreateAccumulationRequest, CreateGridRequest, CreateOrderRequest,
    CreatePriceTargetRequest, CreateStopLossRequest, ImportedWallet, OwnershipCheck, StrategyRequest,
    TradingService, WithdrawRequest, Withdrawal,
};
