//! Persistence ports for strategies and trade orders

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{OrderError, OrderStatus, TradeOrder};
use crate::strategy::Strategy;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Duplicate record: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Trade order persistence. Every status change goes through a method that
/// validates the transition against the stored record under the store's lock,
/// so two callers can never both move the same order out of a status.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: TradeOrder) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<TradeOrder>, StoreError>;

    /// All orders, optionally restricted to one wallet, newest first
    async fn list(&self, wallet_address: Option<&str>) -> Result<Vec<TradeOrder>, StoreError>;

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<TradeOrder>, StoreError>;

    /// Record the last observed price of a pending order. Need not be
    /// durable on its own.
    async fn record_price(&self, id: &str, price: f64) -> Result<(), StoreError>;

    /// The exclusive `pending -> executing` gate. `Ok(None)` when another
    /// caller already moved the order out of `pending`.
    async fn begin_execution(&self, id: &str) -> Result<Option<TradeOrder>, StoreError>;

    async fn complete(
        &self,
        id: &str,
        executed_price: f64,
        tx_hash: String,
    ) -> Result<TradeOrder, StoreError>;

    async fn fail(&self, id: &str, message: String) -> Result<TradeOrder, StoreError>;

    /// `failed -> pending`, clearing the error
    async fn retry(&self, id: &str) -> Result<TradeOrder, StoreError>;

    /// Only `pending` and `failed` orders may be deleted
    async fn delete(&self, id: &str) -> Result<TradeOrder, StoreError>;
}

/// Strategy persistence
#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Insert a new strategy. Ids are never reused, archived ones included.
    async fn create(&self, strategy: &Strategy) -> Result<(), StoreError>;

    /// Insert or replace
    async fn save(&self, strategy: &Strategy) -> Result<(), StoreError>;

    /// Every strategy not archived
    async fn load_all(&self) -> Result<Vec<Strategy>, StoreError>;

    /// Hide from future loads; the record is kept for audit
    async fn archive(&self, id: &str) -> Result<(), StoreError>;
}
