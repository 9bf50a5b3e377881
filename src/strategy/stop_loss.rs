//! Stop-Loss / Take-Profit Strategy
//!
//! Guards an open position. Both exit prices are fixed at construction from
//! the entry price; the first one crossed places a single liquidating SELL
//! and the strategy never acts again.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{positive, Effect, OrderSlot, Tick};
use crate::domain::{OrderIntent, OrderSide, TriggerDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLossTakeProfitStrategy {
    pub entry_price: f64,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    /// Tokens to liquidate
    pub position_amount: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    #[serde(default)]
    pub condition_triggered: bool,
    #[serde(default)]
    pub exit_reason: Option<ExitReason>,
    #[serde(default)]
    pub order_id: Option<String>,
}

impl StopLossTakeProfitStrategy {
    pub fn new(entry_price: f64, stop_loss_percent: f64, take_profit_percent: f64, position_amount: f64) -> Self {
        Self {
            entry_price,
            stop_loss_percent,
            take_profit_percent,
            position_amount,
            stop_price: entry_price * (1.0 - stop_loss_percent / 100.0),
            take_profit_price: entry_price * (1.0 + take_profit_percent / 100.0),
            condition_triggered: false,
            exit_reason: None,
            order_id: None,
        }
    }

    pub fn validate(&self) -> bool {
        positive(self.entry_price)
            && positive(self.stop_loss_percent)
            && self.stop_loss_percent < 100.0
            && positive(self.take_profit_percent)
            && positive(self.position_amount)
    }

    pub(crate) fn evaluate(&mut self, tick: &Tick) -> Vec<Effect> {
        if self.condition_triggered {
            return Vec::new();
        }
        let Some(price) = tick.price else {
            return Vec::new();
        };

        // Fire with the same strict rule the placed order is executed under,
        // so the liquidation is executable at the price that triggered it
        let (reason, target_price, trigger) = if TriggerDirection::Below.is_met(price, self.stop_price) {
            (ExitReason::StopLoss, self.stop_price, TriggerDirection::Below)
        } else if TriggerDirection::Above.is_met(price, self.take_profit_price) {
            (ExitReason::TakeProfit, self.take_profit_price, TriggerDirection::Above)
        } else {
            return Vec::new();
        };

        tracing::info!(
            "{} boundary crossed at {:.6} (entry {:.6}, target {:.6})",
            reason,
            price,
            self.entry_price,
            target_price
        );
        self.exit_reason = Some(reason);

        vec![Effect::PlaceOrder {
            slot: OrderSlot::Primary,
            intent: OrderIntent {
                side: OrderSide::Sell,
                amount: self.position_amount,
                target_price,
                trigger,
            },
        }]
    }

    pub(crate) fn on_order_placed(&mut self, order_id: &str) {
        self.order_id = Some(order_id.to_string());
        self.condition_triggered = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn guard() -> StopLossTakeProfitStrategy {
        StopLossTakeProfitStrategy::new(2.0, 10.0, 25.0, 500.0)
    }

    fn tick(price: f64) -> Tick {
        Tick::new(Utc::now(), Some(price))
    }

    #[test]
    fn test_exit_prices_fixed_at_construction() {
        let s = guard();
        assert_relative_eq!(s.stop_price, 1.8);
        assert_relative_eq!(s.take_profit_price, 2.5);
    }

    #[test]
    fn test_validate() {
        assert!(guard().validate());
        assert!(!StopLossTakeProfitStrategy::new(2.0, 100.0, 25.0, 1.0).validate());
        assert!(!StopLossTakeProfitStrategy::new(2.0, 10.0, 0.0, 1.0).validate());
        assert!(!StopLossTakeProfitStrategy::new(-2.0, 10.0, 5.0, 1.0).validate());
        assert!(!StopLossTakeProfitStrategy::new(2.0, 10.0, 5.0, 0.0).validate());
    }

    #[test]
    fn test_inside_band_no_action() {
        let mut s = guard();
        assert!(s.evaluate(&tick(2.0)).is_empty());
        assert!(s.evaluate(&tick(2.4)).is_empty());
        assert!(s.evaluate(&tick(1.81)).is_empty());
        assert!(s.exit_reason.is_none());
    }

    #[test]
    fn test_stop_loss_places_liquidation() {
        let mut s = guard();
        match &s.evaluate(&tick(1.7))[..] {
            [Effect::PlaceOrder { intent, .. }] => {
                assert_eq!(intent.side, OrderSide::Sell);
                assert_eq!(intent.trigger, TriggerDirection::Below);
                assert_relative_eq!(intent.target_price, 1.8);
                assert_eq!(intent.amount, 500.0);
            }
            other => panic!("unexpected effects: {:?}", other),
        }
        assert_eq!(s.exit_reason, Some(ExitReason::StopLoss));
    }

    #[test]
    fn test_take_profit_places_liquidation() {
        let mut s = guard();
        match &s.evaluate(&tick(2.6))[..] {
            [Effect::PlaceOrder { intent, .. }] => {
                assert_eq!(intent.trigger, TriggerDirection::Above);
                assert_relative_eq!(intent.target_price, 2.5);
            }
            other => panic!("unexpected effects: {:?}", other),
        }
        assert_eq!(s.exit_reason, Some(ExitReason::TakeProfit));
    }

    #[test]
    fn test_boundary_itself_is_not_a_crossing() {
        let mut s = StopLossTakeProfitStrategy::new(2.0, 50.0, 50.0, 10.0);
        assert!(s.evaluate(&tick(1.0)).is_empty());
        assert!(s.evaluate(&tick(3.0)).is_empty());

        match &s.evaluate(&tick(0.99))[..] {
            [Effect::PlaceOrder { intent, .. }] => {
                assert!(intent.trigger.is_met(0.99, intent.target_price));
            }
            other => panic!("unexpected effects: {:?}", other),
        }
    }

    #[test]
    fn test_one_shot() {
        let mut s = guard();
        assert_eq!(s.evaluate(&tick(1.0)).len(), 1);
        s.on_order_placed("exit");
        assert!(s.condition_triggered);
        assert!(s.evaluate(&tick(1.0)).is_empty());
        assert!(s.evaluate(&tick(3.0)).is_empty());
    }
}
