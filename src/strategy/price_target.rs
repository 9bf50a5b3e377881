//! Price-Target Strategy
//!
//! Places a single order once the live price crosses a target. With
//! `execute_once` the strategy ends after its order resolves; otherwise it
//! re-arms and can place again on a later tick.

use serde::{Deserialize, Serialize};

use super::{positive, resolve, Effect, InFlight, OrderSlot, Tick};
use crate::domain::{OrderIntent, OrderSide, TriggerDirection};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTargetStrategy {
    /// ADA per whole base token
    pub target_price: f64,
    /// ADA to spend for a buy, tokens to sell for a sell
    pub amount: f64,
    pub side: OrderSide,
    pub trigger: TriggerDirection,
    /// Order placed and not yet resolved
    #[serde(default)]
    pub order_id: Option<String>,
}

impl PriceTargetStrategy {
    pub fn new(target_price: f64, amount: f64, side: OrderSide, trigger: TriggerDirection) -> Self {
        Self {
            target_price,
            amount,
            side,
            trigger,
            order_id: None,
        }
    }

    pub fn validate(&self) -> bool {
        positive(self.target_price) && positive(self.amount)
    }

    pub(crate) fn evaluate(&mut self, tick: &Tick, execute_once: bool) -> Vec<Effect> {
        if let Some(order_id) = self.order_id.clone() {
            let reason = match resolve(tick, &order_id) {
                InFlight::Waiting => return Vec::new(),
                InFlight::Completed(_) => "target order completed",
                InFlight::Failed => "target order failed",
                InFlight::Gone => "target order removed",
            };
            self.order_id = None;
            if execute_once {
                return vec![Effect::Deactivate { reason: reason.to_string() }];
            }
            // Re-arm; a new order may be placed next tick
            return Vec::new();
        }

        let Some(price) = tick.price else {
            return Vec::new();
        };
        if !self.trigger.is_met(price, self.target_price) {
            return Vec::new();
        }

        vec![Effect::PlaceOrder {
            slot: OrderSlot::Primary,
            intent: OrderIntent {
                side: self.side,
                amount: self.amount,
                target_price: self.target_price,
                trigger: self.trigger,
            },
        }]
    }

    pub(crate) fn on_order_placed(&mut self, order_id: &str) {
        self.order_id = Some(order_id.to_string());
    }
}
