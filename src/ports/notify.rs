//! Real-time notification channel

use serde::{Deserialize, Serialize};

use crate::domain::{OrderStatus, TradeOrder};

/// Significant step of order processing reported as an `OrderStep`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStep {
    PriceCheck,
    WalletLoad,
    Submission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    OrderCreated {
        order: TradeOrder,
    },
    OrderStatusChanged {
        order_id: String,
        wallet_address: String,
        from: OrderStatus,
        to: OrderStatus,
        message: Option<String>,
    },
    OrderStep {
        order_id: String,
        step: OrderStep,
        message: String,
    },
    StrategyOrderPlaced {
        strategy_id: String,
        strategy_name: String,
        order_id: String,
    },
    StrategyDeactivated {
        strategy_id: String,
        strategy_name: String,
        reason: String,
    },
    StrategyError {
        strategy_id: String,
        strategy_name: String,
        error: String,
    },
}

/// Fire-and-forget sink. Implementations must return immediately and
/// must never fail the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: EngineEvent);
}
