//! Trade Order
//!
//! A single discrete swap intent tracked through its execution lifecycle:
//! `Pending -> Executing -> Completed | Failed`, with `Failed -> Pending`
//! only through an explicit retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Direction of the price comparison gating an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerDirection {
    Above,
    Below,
}

impl TriggerDirection {
    /// Strict comparison: equality never triggers
    pub fn is_met(self, current: f64, target: f64) -> bool {
        match self {
            TriggerDirection::Above => current > target,
            TriggerDirection::Below => current < target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl OrderStatus {
    /// Pending or executing orders count against a strategy's in-flight slot
    pub fn is_in_flight(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Executing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Executing => "executing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderError {
    #[error("Invalid order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order in status {0} cannot be deleted")]
    NotDeletable(OrderStatus),
    #[error("Invalid order: {0}")]
    Invalid(String),
}

/// Fields a caller supplies to create an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: OrderSide,
    pub amount: f64,
    pub target_price: f64,
    pub trigger: TriggerDirection,
}

impl OrderIntent {
    /// Buy that any positive live price satisfies
    pub fn market_buy(amount: f64) -> Self {
        Self {
            side: OrderSide::Buy,
            amount,
            target_price: 0.0,
            trigger: TriggerDirection::Above,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub id: String,
    pub wallet_address: String,
    pub strategy_id: Option<String>,
    pub pair: String,
    pub base_token: String,
    pub quote_token: String,
    pub pool_id: String,
    pub side: OrderSide,
    pub amount: f64,
    pub target_price: f64,
    pub trigger: TriggerDirection,
    pub current_price: Option<f64>,
    pub executed_price: Option<f64>,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Market coordinates shared by an order and the strategy that placed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub pair: String,
    pub base_token: String,
    pub quote_token: String,
    pub pool_id: String,
}

impl TradeOrder {
    pub fn new(
        wallet_address: String,
        strategy_id: Option<String>,
        market: Market,
        intent: OrderIntent,
    ) -> Result<Self, OrderError> {
        if !(intent.amount.is_finite() && intent.amount > 0.0) {
            return Err(OrderError::Invalid(format!("amount must be > 0, got {}", intent.amount)));
        }
        if !(intent.target_price.is_finite() && intent.target_price >= 0.0) {
            return Err(OrderError::Invalid(format!(
                "target price must be >= 0, got {}",
                intent.target_price
            )));
        }
        if wallet_address.is_empty() || market.pool_id.is_empty() || market.base_token.is_empty() {
            return Err(OrderError::Invalid(
                "wallet address, pool id and base token are required".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_address,
            strategy_id,
            pair: market.pair,
            base_token: market.base_token,
            quote_token: market.quote_token,
            pool_id: market.pool_id,
            side: intent.side,
            amount: intent.amount,
            target_price: intent.target_price,
            trigger: intent.trigger,
            current_price: None,
            executed_price: None,
            tx_hash: None,
            error_message: None,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            executed_at: None,
        })
    }

    pub fn is_triggered(&self, current_price: f64) -> bool {
        self.trigger.is_met(current_price, self.target_price)
    }

    pub fn record_price(&mut self, price: f64) {
        self.current_price = Some(price);
        self.updated_at = Utc::now();
    }

    pub fn begin_execution(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Pending, OrderStatus::Executing)?;
        Ok(())
    }

    pub fn complete(&mut self, executed_price: f64, tx_hash: String) -> Result<(), OrderError> {
        self.transition(OrderStatus::Executing, OrderStatus::Completed)?;
        let now = Utc::now();
        self.executed_price = Some(executed_price);
        self.tx_hash = Some(tx_hash);
        self.executed_at = Some(now);
        self.error_message = None;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), OrderError> {
        self.transition(OrderStatus::Executing, OrderStatus::Failed)?;
        self.error_message = Some(message.into());
        self.executed_price = None;
        self.tx_hash = None;
        Ok(())
    }

    /// User-initiated only. Clears the previous error.
    pub fn retry(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Failed, OrderStatus::Pending)?;
        self.error_message = None;
        Ok(())
    }

    pub fn can_delete(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Failed)
    }

    pub fn ensure_deletable(&self) -> Result<(), OrderError> {
        if self.can_delete() {
            Ok(())
        } else {
            Err(OrderError::NotDeletable(self.status))
        }
    }

    fn transition(&mut self, from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        if self.status != from {
            return Err(OrderError::InvalidTransition { from: self.status, to });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl fmt::Display for TradeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {} {:?} ({})",
            &self.id[..8.min(self.id.len())],
            self.side,
            self.amount,
            self.target_price,
            self.trigger,
            self.status
        )
    }
}
