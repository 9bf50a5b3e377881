//! Grid Strategy
//!
//! Evenly spaced price levels between a lower and an upper bound. A level
//! is armed for one side at a time:
//! - On first evaluation every level strictly below the live price is armed BUY
//! - A filled BUY at level `i` arms a SELL of the bought tokens at level `i + 1`,
//!   or at level `i` itself when it is the top level or `i + 1` is armed BUY
//! - A filled SELL at level `j` realizes profit and re-arms BUY at level `j - 1`
//!   unless that level still holds tokens
//!
//! Each level records its open order. At most one order across all levels
//! is in flight, and an order is only placed for a level whose condition
//! holds at the live price. Among triggered BUY levels the highest one wins.

use serde::{Deserialize, Serialize};

use super::{positive, resolve, Effect, InFlight, OrderSlot, Tick};
use crate::domain::{OrderIntent, OrderSide, TriggerDirection};

pub const MAX_GRID_LEVELS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub price: f64,
    /// Side this level will trade next, if any
    pub armed: Option<OrderSide>,
    /// Tokens held for an armed sell
    #[serde(default)]
    pub quantity: f64,
    /// Price those tokens were bought at
    #[serde(default)]
    pub cost_basis: f64,
    /// Open order placed for this level
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridStrategy {
    pub lower_price: f64,
    pub upper_price: f64,
    pub grid_levels: usize,
    /// ADA committed per buy level
    pub investment_per_level: f64,
    pub levels: Vec<GridLevel>,
    #[serde(default)]
    pub realized_profit: f64,
    #[serde(default)]
    pub initialized: bool,
}

impl GridStrategy {
    pub fn new(lower_price: f64, upper_price: f64, grid_levels: usize, investment_per_level: f64) -> Self {
        let step = if grid_levels > 1 {
            (upper_price - lower_price) / (grid_levels - 1) as f64
        } else {
            0.0
        };
        // Out-of-range counts build no levels and fail validation
        let built = if grid_levels <= MAX_GRID_LEVELS { grid_levels } else { 0 };
        let levels = (0..built)
            .map(|i| GridLevel {
                price: lower_price + step * i as f64,
                armed: None,
                quantity: 0.0,
                cost_basis: 0.0,
                order_id: None,
            })
            .collect();

        Self {
            lower_price,
            upper_price,
            grid_levels,
            investment_per_level,
            levels,
            realized_profit: 0.0,
            initialized: false,
        }
    }

    pub fn validate(&self) -> bool {
        positive(self.lower_price)
            && positive(self.upper_price)
            && self.upper_price > self.lower_price
            && (2..=MAX_GRID_LEVELS).contains(&self.grid_levels)
            && self.levels.len() == self.grid_levels
            && positive(self.investment_per_level)
    }

    /// Ids of open level orders
    pub fn open_orders(&self) -> Vec<String> {
        self.levels.iter().filter_map(|l| l.order_id.clone()).collect()
    }

    fn reconcile(&mut self, tick: &Tick) {
        let open: Vec<(usize, String)> = self
            .levels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.order_id.clone().map(|id| (i, id)))
            .collect();
        for (index, order_id) in open {
            let filled = match resolve(tick, &order_id) {
                InFlight::Waiting => continue,
                InFlight::Completed(snapshot) => Some(snapshot.clone()),
                // Level stays armed and may be placed again
                InFlight::Failed | InFlight::Gone => None,
            };
            self.levels[index].order_id = None;

            let Some(fill) = filled else { continue };
            let level_price = self.levels[index].price;
            let executed = fill.executed_price.filter(|p| positive(*p)).unwrap_or(level_price);

            match fill.side {
                OrderSide::Buy => {
                    self.levels[index].armed = None;
                    self.stock(index, fill.amount / executed, executed);
                }
                OrderSide::Sell => {
                    let level = &mut self.levels[index];
                    self.realized_profit += (executed - level.cost_basis) * level.quantity;
                    level.armed = None;
                    level.quantity = 0.0;
                    level.cost_basis = 0.0;
                    if index > 0 && self.levels[index - 1].quantity == 0.0 {
                        self.levels[index - 1].armed = Some(OrderSide::Buy);
                    }
                }
            }
        }
    }

    /// Arm a sell for tokens bought at level `index`. Tokens already held
    /// by the receiving level are merged at their average cost.
    fn stock(&mut self, index: usize, quantity: f64, cost: f64) {
        let target = match self.levels.get(index + 1) {
            Some(above) if above.armed != Some(OrderSide::Buy) => index + 1,
            _ => index,
        };
        let level = &mut self.levels[target];
        let held = level.quantity + quantity;
        if held > 0.0 {
            level.cost_basis = (level.cost_basis * level.quantity + cost * quantity) / held;
        }
        level.quantity = held;
        level.armed = Some(OrderSide::Sell);
    }

    /// Tokens bought and not yet sold, across all levels
    pub fn held_quantity(&self) -> f64 {
        self.levels.iter().map(|l| l.quantity).sum()
    }

    fn next_order(&self, price: f64) -> Option<(usize, OrderIntent)> {
        let sell = self
            .levels
            .iter()
            .enumerate()
            .rev()
            .find(|(_, l)| l.armed == Some(OrderSide::Sell) && TriggerDirection::Above.is_met(price, l.price));
        if let Some((i, level)) = sell {
            return Some((
                i,
                OrderIntent {
                    side: OrderSide::Sell,
                    amount: level.quantity,
                    target_price: level.price,
                    trigger: TriggerDirection::Above,
                },
            ));
        }

        self.levels
            .iter()
            .enumerate()
            .rev()
            .find(|(_, l)| l.armed == Some(OrderSide::Buy) && TriggerDirection::Below.is_met(price, l.price))
            .map(|(i, level)| {
                (
                    i,
                    OrderIntent {
                        side: OrderSide::Buy,
                        amount: self.investment_per_level,
                        target_price: level.price,
                        trigger: TriggerDirection::Below,
                    },
                )
            })
    }

    pub(crate) fn evaluate(&mut self, tick: &Tick) -> Vec<Effect> {
        self.reconcile(tick);

        let Some(price) = tick.price else {
            return Vec::new();
        };

        if !self.initialized {
            for level in self.levels.iter_mut().filter(|l| l.price < price) {
                level.armed = Some(OrderSide::Buy);
            }
            self.initialized = true;
        }

        if self.levels.iter().any(|l| l.order_id.is_some()) {
            return Vec::new();
        }

        match self.next_order(price) {
            Some((index, intent)) => vec![Effect::PlaceOrder {
                slot: OrderSlot::Level(index),
                intent,
            }],
            None => Vec::new(),
        }
    }

    /// Bind a retried order to the armed level it was placed for
    pub(crate) fn adopt(&mut self, order_id: &str, side: OrderSide, target_price: f64) -> bool {
        if self.levels.iter().any(|l| l.order_id.is_some()) {
            return false;
        }
        let level = self
            .levels
            .iter_mut()
            .find(|l| l.armed == Some(side) && (l.price - target_price).abs() <= 1e-9 * l.price);
        match level {
            Some(level) => {
                level.order_id = Some(order_id.to_string());
                true
            }
            None => false,
        }
    }

    pub(crate) fn on_order_placed(&mut self, slot: OrderSlot, order_id: &str) {
        if let OrderSlot::Level(index) = slot {
            if let Some(level) = self.levels.get_mut(index) {
                level.order_id = Some(order_id.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderStatus;
    use crate::strategy::test_support::snapshot;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn grid() -> GridStrategy {
        // Levels 1.0, 1.5, 2.0
        GridStrategy::new(1.0, 2.0, 3, 100.0)
    }

    fn placed(effects: &[Effect]) -> (usize, OrderIntent) {
        match effects {
            [Effect::PlaceOrder { slot: OrderSlot::Level(i), intent }] => (*i, intent.clone()),
            other => panic!("expected one level order, got {:?}", other),
        }
    }

    #[test]
    fn test_levels_evenly_spaced() {
        let g = grid();
        let prices: Vec<f64> = g.levels.iter().map(|l| l.price).collect();
        assert_eq!(prices, vec![1.0, 1.5, 2.0]);
        assert!(g.validate());
    }

    #[test]
    fn test_validate_rejects_bad_bounds() {
        assert!(!GridStrategy::new(2.0, 1.0, 3, 100.0).validate());
        assert!(!GridStrategy::new(1.0, 2.0, 1, 100.0).validate());
        assert!(!GridStrategy::new(1.0, 2.0, 3, 0.0).validate());
        assert!(!GridStrategy::new(0.0, 2.0, 3, 10.0).validate());
        assert!(GridStrategy::new(1.0, 2.0, MAX_GRID_LEVELS, 10.0).validate());
        let huge = GridStrategy::new(1.0, 2.0, usize::MAX, 10.0);
        assert!(huge.levels.is_empty());
        assert!(!huge.validate());
    }

    #[test]
    fn test_first_evaluation_arms_levels_below_price() {
        let mut g = grid();
        assert!(g.evaluate(&Tick::new(Utc::now(), Some(1.8))).is_empty());
        let armed: Vec<Option<OrderSide>> = g.levels.iter().map(|l| l.armed).collect();
        assert_eq!(armed, vec![Some(OrderSide::Buy), Some(OrderSide::Buy), None]);
    }

    #[test]
    fn test_no_price_no_arming() {
        let mut g = grid();
        assert!(g.evaluate(&Tick::new(Utc::now(), None)).is_empty());
        assert!(!g.initialized);
    }

    #[test]
    fn test_buy_fill_arms_sell_above_and_sell_fill_realizes_profit() {
        let mut g = grid();
        g.evaluate(&Tick::new(Utc::now(), Some(1.8)));

        let (index, intent) = placed(&g.evaluate(&Tick::new(Utc::now(), Some(1.4))));
        assert_eq!(index, 1);
        assert_eq!(intent.side, OrderSide::Buy);
        assert_eq!(intent.trigger, TriggerDirection::Below);
        assert_eq!(intent.amount, 100.0);
        g.on_order_placed(OrderSlot::Level(index), "buy-1");

        let filled = Tick::new(Utc::now(), Some(1.4))
            .with_order("buy-1", snapshot(OrderStatus::Completed, OrderSide::Buy, 100.0, Some(1.25)));
        assert!(g.evaluate(&filled).is_empty());
        assert_eq!(g.levels[1].armed, None);
        assert_eq!(g.levels[2].armed, Some(OrderSide::Sell));
        assert_relative_eq!(g.levels[2].quantity, 80.0);

        let (index, intent) = placed(&g.evaluate(&Tick::new(Utc::now(), Some(2.1))));
        assert_eq!(index, 2);
        assert_eq!(intent.side, OrderSide::Sell);
        assert_eq!(intent.trigger, TriggerDirection::Above);
        assert_relative_eq!(intent.amount, 80.0);
        g.on_order_placed(OrderSlot::Level(index), "sell-2");

        let sold = Tick::new(Utc::now(), Some(2.1))
            .with_order("sell-2", snapshot(OrderStatus::Completed, OrderSide::Sell, 80.0, Some(2.0)));
        g.evaluate(&sold);
        assert_relative_eq!(g.realized_profit, 60.0);
        assert_eq!(g.levels[2].armed, None);
        assert_eq!(g.levels[1].armed, Some(OrderSide::Buy));
    }

    #[test]
    fn test_single_in_flight_order() {
        let mut g = GridStrategy::new(1.0, 3.0, 5, 10.0);
        g.evaluate(&Tick::new(Utc::now(), Some(2.9)));
        let (index, _) = placed(&g.evaluate(&Tick::new(Utc::now(), Some(1.2))));
        g.on_order_placed(OrderSlot::Level(index), "o1");

        let pending = Tick::new(Utc::now(), Some(1.2))
            .with_order("o1", snapshot(OrderStatus::Pending, OrderSide::Buy, 10.0, None));
        assert!(g.evaluate(&pending).is_empty());
        assert_eq!(g.open_orders(), vec!["o1".to_string()]);
    }

    #[test]
    fn test_failed_order_keeps_level_armed() {
        let mut g = grid();
        g.evaluate(&Tick::new(Utc::now(), Some(1.8)));
        let (index, _) = placed(&g.evaluate(&Tick::new(Utc::now(), Some(1.4))));
        g.on_order_placed(OrderSlot::Level(index), "o1");

        let failed = Tick::new(Utc::now(), Some(1.4))
            .with_order("o1", snapshot(OrderStatus::Failed, OrderSide::Buy, 100.0, None));
        let (again, _) = placed(&g.evaluate(&failed));
        assert_eq!(again, index);
        assert_eq!(g.levels[index].armed, Some(OrderSide::Buy));
    }

    #[test]
    fn test_top_level_buy_keeps_tokens() {
        let mut g = grid();
        // Opened above the range: every level arms BUY, the top one included
        g.evaluate(&Tick::new(Utc::now(), Some(2.5)));
        assert!(g.levels.iter().all(|l| l.armed == Some(OrderSide::Buy)));

        let (index, _) = placed(&g.evaluate(&Tick::new(Utc::now(), Some(1.9))));
        assert_eq!(index, 2);
        g.on_order_placed(OrderSlot::Level(index), "top");

        let filled = Tick::new(Utc::now(), Some(1.9))
            .with_order("top", snapshot(OrderStatus::Completed, OrderSide::Buy, 100.0, Some(2.0)));
        g.evaluate(&filled);
        assert_eq!(g.levels[2].armed, Some(OrderSide::Sell));
        assert_relative_eq!(g.held_quantity(), 50.0);
        assert_relative_eq!(g.levels[2].cost_basis, 2.0);
    }

    #[test]
    fn test_buy_never_overwrites_armed_buy_above() {
        let mut g = grid();
        g.evaluate(&Tick::new(Utc::now(), Some(1.8)));

        // Both 1.0 and 1.5 are triggered at 0.9; the higher one is bought first
        let (index, _) = placed(&g.evaluate(&Tick::new(Utc::now(), Some(0.9))));
        assert_eq!(index, 1);
        g.on_order_placed(OrderSlot::Level(index), "b1");
        let filled = Tick::new(Utc::now(), Some(0.9))
            .with_order("b1", snapshot(OrderStatus::Completed, OrderSide::Buy, 100.0, Some(1.25)));
        let (index, _) = placed(&g.evaluate(&filled));
        assert_eq!(index, 0);
        g.on_order_placed(OrderSlot::Level(index), "b0");

        let filled = Tick::new(Utc::now(), Some(0.9))
            .with_order("b0", snapshot(OrderStatus::Completed, OrderSide::Buy, 100.0, Some(1.0)));
        g.evaluate(&filled);
        assert_eq!(g.levels[1].armed, Some(OrderSide::Sell));
        assert_eq!(g.levels[2].armed, Some(OrderSide::Sell));
        assert_relative_eq!(g.held_quantity(), 180.0);
    }

    #[test]
    fn test_sell_fill_keeps_tokens_held_below() {
        let mut g = grid();
        g.evaluate(&Tick::new(Utc::now(), Some(1.8)));
        let (i, _) = placed(&g.evaluate(&Tick::new(Utc::now(), Some(1.4))));
        g.on_order_placed(OrderSlot::Level(i), "b1");
        let t = Tick::new(Utc::now(), Some(0.9))
            .with_order("b1", snapshot(OrderStatus::Completed, OrderSide::Buy, 100.0, Some(1.25)));
        let (i, _) = placed(&g.evaluate(&t));
        assert_eq!(i, 0);
        g.on_order_placed(OrderSlot::Level(i), "b0");
        let t = Tick::new(Utc::now(), Some(2.1))
            .with_order("b0", snapshot(OrderStatus::Completed, OrderSide::Buy, 100.0, Some(1.0)));

        // Level 1 now holds 100 tokens, level 2 holds 80; the higher sell goes first
        let (i, _) = placed(&g.evaluate(&t));
        assert_eq!(i, 2);
        g.on_order_placed(OrderSlot::Level(i), "s2");
        let sold = Tick::new(Utc::now(), Some(1.2))
            .with_order("s2", snapshot(OrderStatus::Completed, OrderSide::Sell, 80.0, Some(2.0)));
        g.evaluate(&sold);
        assert_eq!(g.levels[1].armed, Some(OrderSide::Sell));
        assert_relative_eq!(g.held_quantity(), 100.0);
    }

    #[test]
    fn test_adopt_only_onto_matching_armed_level() {
        let mut g = grid();
        g.evaluate(&Tick::new(Utc::now(), Some(1.8)));
        assert!(!g.adopt("o1", OrderSide::Sell, 1.5));
        assert!(!g.adopt("o1", OrderSide::Buy, 1.25));
        assert!(g.adopt("o1", OrderSide::Buy, 1.5));
        assert_eq!(g.levels[1].order_id.as_deref(), Some("o1"));
        assert!(!g.adopt("o2", OrderSide::Buy, 1.0));
    }

    #[test]
    fn test_level_order_mapping_serializes() {
        let mut g = grid();
        g.on_order_placed(OrderSlot::Level(1), "o1");
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["levels"][1]["order_id"], "o1");
        let back: GridStrategy = serde_json::from_value(json).unwrap();
        assert_eq!(back, g);
    }
}
