//! Strategy Layer - Conditional trading intents as state machines
//!
//! Every strategy shares one envelope (`Strategy`) and carries exactly one
//! variant payload (`StrategyKind`):
//! - `PriceTarget`: single order once the price crosses a target
//! - `Accumulation`: fixed-size market buys at a fixed interval
//! - `Grid`: buy/sell ladder between two price bounds
//! - `StopLossTakeProfit`: one-shot liquidation at either boundary
//!
//! Evaluation is pure with respect to I/O: `evaluate(&Tick)` returns
//! `Effect`s that the scheduler applies (placing orders, deactivating),
//! and the scheduler reports placements back through `on_order_placed`.

pub mod price_target;
pub mod accumulation;
pub mod grid;
pub mod stop_loss;
pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::{Market, OrderIntent, OrderSide, OrderStatus, TradeOrder};

pub use price_target::PriceTargetStrategy;
pub use accumulation::AccumulationStrategy;
pub use grid::{GridLevel, GridStrategy};
pub use stop_loss::{ExitReason, StopLossTakeProfitStrategy};
pub use registry::StrategyRegistry;

/// What a strategy needs to know about one of its orders
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub status: OrderStatus,
    pub side: OrderSide,
    pub amount: f64,
    pub executed_price: Option<f64>,
}

impl From<&TradeOrder> for OrderSnapshot {
    fn from(order: &TradeOrder) -> Self {
        Self {
            status: order.status,
            side: order.side,
            amount: order.amount,
            executed_price: order.executed_price,
        }
    }
}

/// Input of one evaluation
#[derive(Debug, Clone, Default)]
pub struct Tick {
    pub now: DateTime<Utc>,
    /// Live price, `None` when the oracle call failed this tick
    pub price: Option<f64>,
    /// Current state of every order the strategy has in flight. An id
    /// missing here was deleted from the order store.
    pub orders: HashMap<String, OrderSnapshot>,
}

impl Tick {
    pub fn new(now: DateTime<Utc>, price: Option<f64>) -> Self {
        Self { now, price, orders: HashMap::new() }
    }

    pub fn with_order(mut self, id: &str, snapshot: OrderSnapshot) -> Self {
        self.orders.insert(id.to_string(), snapshot);
        self
    }
}

/// Which conceptual order of a strategy an effect refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSlot {
    Primary,
    Level(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PlaceOrder { slot: OrderSlot, intent: OrderIntent },
    Deactivate { reason: String },
}

/// How an in-flight order reference resolved against the order store
pub(crate) enum InFlight<'a> {
    Waiting,
    Completed(&'a OrderSnapshot),
    Failed,
    Gone,
}

pub(crate) fn resolve<'a>(tick: &'a Tick, order_id: &str) -> InFlight<'a> {
    match tick.orders.get(order_id) {
        Some(s) if s.status.is_in_flight() => InFlight::Waiting,
        Some(s) if s.status == OrderStatus::Completed => InFlight::Completed(s),
        Some(_) => InFlight::Failed,
        None => InFlight::Gone,
    }
}

pub(crate) fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Variant payload. Exactly one per strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyKind {
    PriceTarget(PriceTargetStrategy),
    Accumulation(AccumulationStrategy),
    Grid(GridStrategy),
    StopLossTakeProfit(StopLossTakeProfitStrategy),
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::PriceTarget(_) => "price_target",
            StrategyKind::Accumulation(_) => "accumulation",
            StrategyKind::Grid(_) => "grid",
            StrategyKind::StopLossTakeProfit(_) => "stop_loss_take_profit",
        }
    }

    pub fn validate(&self) -> bool {
        match self {
            StrategyKind::PriceTarget(s) => s.validate(),
            StrategyKind::Accumulation(s) => s.validate(),
            StrategyKind::Grid(s) => s.validate(),
            StrategyKind::StopLossTakeProfit(s) => s.validate(),
        }
    }

    fn evaluate(&mut self, tick: &Tick, execute_once: bool) -> Vec<Effect> {
        match self {
            StrategyKind::PriceTarget(s) => s.evaluate(tick, execute_once),
            StrategyKind::Accumulation(s) => s.evaluate(tick, execute_once),
            StrategyKind::Grid(s) => s.evaluate(tick),
            StrategyKind::StopLossTakeProfit(s) => s.evaluate(tick),
        }
    }

    fn on_order_placed(&mut self, slot: OrderSlot, order_id: &str, now: DateTime<Utc>) {
        match self {
            StrategyKind::PriceTarget(s) => s.on_order_placed(order_id),
            StrategyKind::Accumulation(s) => s.on_order_placed(order_id, now),
            StrategyKind::Grid(s) => s.on_order_placed(slot, order_id),
            StrategyKind::StopLossTakeProfit(s) => s.on_order_placed(order_id),
        }
    }

    /// Ids of orders this strategy still tracks
    pub fn tracked_orders(&self) -> Vec<String> {
        match self {
            StrategyKind::PriceTarget(s) => s.order_id.iter().cloned().collect(),
            StrategyKind::Accumulation(s) => s.order_id.iter().cloned().collect(),
            StrategyKind::Grid(s) => s.open_orders(),
            StrategyKind::StopLossTakeProfit(s) => s.order_id.iter().cloned().collect(),
        }
    }

    /// Point the slot that placed `order` back at it after a retry
    fn adopt(&mut self, order: &TradeOrder) -> bool {
        match self {
            StrategyKind::PriceTarget(s) => s.order_id = Some(order.id.clone()),
            StrategyKind::Accumulation(s) => s.order_id = Some(order.id.clone()),
            StrategyKind::Grid(s) => return s.adopt(&order.id, order.side, order.target_price),
            StrategyKind::StopLossTakeProfit(s) => s.order_id = Some(order.id.clone()),
        }
        true
    }

    /// Terminal variants never act again
    fn is_terminal(&self) -> bool {
        match self {
            StrategyKind::StopLossTakeProfit(s) => s.condition_triggered,
            _ => false,
        }
    }

    /// Whether evaluation is meaningless without a live price
    pub fn needs_price(&self) -> bool {
        !matches!(self, StrategyKind::Accumulation(_))
    }
}

/// Fields common to every strategy variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub wallet_address: String,
    pub market: Market,
    pub is_active: bool,
    pub execute_once: bool,
    /// Last price seen by the scheduler, for status reporting
    pub last_price: Option<f64>,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub kind: StrategyKind,
}

/// Read-only view handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStatus {
    pub id: String,
    pub name: String,
    pub strategy_type: String,
    pub wallet_address: String,
    pub pair: String,
    pub pool_id: String,
    pub is_active: bool,
    pub execute_once: bool,
    pub current_price: Option<f64>,
    pub last_evaluated_at: Option<DateTime<Utc>>,
    pub in_flight_orders: Vec<String>,
    pub details: serde_json::Value,
}

impl Strategy {
    /// New active strategy. `id` is generated when not supplied.
    pub fn new(
        id: Option<String>,
        name: String,
        wallet_address: String,
        market: Market,
        execute_once: bool,
        kind: StrategyKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name,
            wallet_address,
            market,
            is_active: true,
            execute_once,
            last_price: None,
            last_evaluated_at: None,
            created_at: now,
            updated_at: now,
            kind,
        }
    }

    /// Config sanity. Never panics on bad input.
    pub fn validate(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.wallet_address.is_empty()
            && !self.market.pool_id.is_empty()
            && !self.market.base_token.is_empty()
            && !self.market.quote_token.is_empty()
            && self.kind.validate()
    }

    pub fn tracked_orders(&self) -> Vec<String> {
        self.kind.tracked_orders()
    }

    /// One scheduler tick. Inactive strategies return no effects.
    pub fn evaluate(&mut self, tick: &Tick) -> Vec<Effect> {
        if !self.is_active {
            return Vec::new();
        }

        if let Some(price) = tick.price {
            self.last_price = Some(price);
        }
        self.last_evaluated_at = Some(tick.now);
        self.updated_at = tick.now;

        let effects = self.kind.evaluate(tick, self.execute_once);
        for effect in &effects {
            if let Effect::Deactivate { reason } = effect {
                tracing::info!("Strategy '{}' deactivated: {}", self.name, reason);
                self.is_active = false;
            }
        }
        effects
    }

    /// Record that the scheduler persisted an order for `slot`. Returns the
    /// deactivation reason when the placement made the strategy terminal.
    pub fn on_order_placed(&mut self, slot: OrderSlot, order_id: &str, now: DateTime<Utc>) -> Option<String> {
        self.kind.on_order_placed(slot, order_id, now);
        self.updated_at = now;
        if self.kind.is_terminal() && self.is_active {
            self.is_active = false;
            return Some("liquidating order placed".to_string());
        }
        None
    }

    /// Re-attach a failed order of this strategy that is being retried.
    ///
    /// Refused while the strategy tracks any other order, since the retried
    /// order would then be a second one in flight (or would displace a fill
    /// not yet reconciled).
    pub fn adopt_retried(&mut self, order: &TradeOrder) -> Result<(), String> {
        if let Some(other) = self.tracked_orders().into_iter().find(|id| *id != order.id) {
            return Err(format!("strategy {} still tracks order {}", self.id, other));
        }
        if !self.kind.adopt(order) {
            return Err(format!("strategy {} has no slot for order {}", self.id, order.id));
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn status(&self) -> StrategyStatus {
        StrategyStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            strategy_type: self.kind.label().to_string(),
            wallet_address: self.wallet_address.clone(),
            pair: self.market.pair.clone(),
            pool_id: self.market.pool_id.clone(),
            is_active: self.is_active,
            execute_once: self.execute_once,
            current_price: self.last_price,
            last_evaluated_at: self.last_evaluated_at,
            in_flight_orders: self.tracked_orders(),
            details: serde_json::to_value(&self.kind).unwrap_or(serde_json::Value::Null),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::domain::TriggerDirection;

    fn price_target(execute_once: bool) -> Strategy {
        Strategy::new(
            None,
            "Buy MIN above 2".to_string(),
            "addr_test1qwallet".to_string(),
            market(),
            execute_once,
            StrategyKind::PriceTarget(PriceTargetStrategy::new(
                2.0,
                100.0,
                OrderSide::Buy,
                TriggerDirection::Above,
            )),
        )
    }

    #[test]
    fn test_new_generates_id() {
        let s = price_target(true);
        assert!(!s.id.is_empty());
        assert!(s.is_active);

        let named = Strategy::new(
            Some("my-id".to_string()),
            "n".to_string(),
            "w".to_string(),
            market(),
            false,
            s.kind.clone(),
        );
        assert_eq!(named.id, "my-id");
    }

    #[test]
    fn test_validate_envelope() {
        let mut s = price_target(true);
        assert!(s.validate());
        s.market.pool_id.clear();
        assert!(!s.validate());
    }

    #[test]
    fn test_inactive_strategy_does_nothing() {
        let mut s = price_target(true);
        s.is_active = false;
        assert!(s.evaluate(&Tick::new(Utc::now(), Some(2.5))).is_empty());
        assert_eq!(s.last_price, None);
    }

    #[test]
    fn test_evaluate_caches_price() {
        let mut s = price_target(true);
        s.evaluate(&Tick::new(Utc::now(), Some(1.5)));
        assert_eq!(s.last_price, Some(1.5));
        s.evaluate(&Tick::new(Utc::now(), None));
        assert_eq!(s.last_price, Some(1.5));
    }

    #[test]
    fn test_deactivate_effect_flips_flag() {
        let mut s = price_target(true);
        let effects = s.evaluate(&Tick::new(Utc::now(), Some(2.5)));
        assert_eq!(effects.len(), 1);
        s.on_order_placed(OrderSlot::Primary, "o1", Utc::now());

        let tick = Tick::new(Utc::now(), Some(2.5))
            .with_order("o1", snapshot(OrderStatus::Completed, OrderSide::Buy, 100.0, Some(2.5)));
        let effects = s.evaluate(&tick);
        assert!(matches!(effects[0], Effect::Deactivate { .. }));
        assert!(!s.is_active);
    }

    #[test]
    fn test_status_is_read_only_snapshot() {
        let mut s = price_target(false);
        s.evaluate(&Tick::new(Utc::now(), Some(2.5)));
        s.on_order_placed(OrderSlot::Primary, "o1", Utc::now());

        let before = s.clone();
        let status = s.status();
        assert_eq!(s, before);
        assert_eq!(status.strategy_type, "price_target");
        assert_eq!(status.in_flight_orders, vec!["o1".to_string()]);
        assert_eq!(status.current_price, Some(2.5));
        assert_eq!(status.details["type"], "price_target");
    }

    fn failed_order(strategy: &Strategy, id: &str) -> TradeOrder {
        let intent = OrderIntent {
            side: OrderSide::Buy,
            amount: 100.0,
            target_price: 2.0,
            trigger: TriggerDirection::Above,
        };
        let mut order = TradeOrder::new(
            strategy.wallet_address.clone(),
            Some(strategy.id.clone()),
            market(),
            intent,
        )
        .unwrap();
        order.id = id.to_string();
        order
    }

    #[test]
    fn test_adopt_retried_refused_while_tracking_another() {
        let mut s = price_target(false);
        s.evaluate(&Tick::new(Utc::now(), Some(2.5)));
        s.on_order_placed(OrderSlot::Primary, "second", Utc::now());

        let first = failed_order(&s, "first");
        assert!(s.adopt_retried(&first).is_err());
        assert_eq!(s.tracked_orders(), vec!["second".to_string()]);
    }

    #[test]
    fn test_adopt_retried_rebinds_free_slot() {
        let mut s = price_target(false);
        let first = failed_order(&s, "first");
        assert!(s.adopt_retried(&first).is_ok());
        assert_eq!(s.tracked_orders(), vec!["first".to_string()]);

        // Waiting on the retried order: nothing new is placed
        let tick = Tick::new(Utc::now(), Some(2.5))
            .with_order("first", snapshot(OrderStatus::Pending, OrderSide::Buy, 100.0, None));
        assert!(s.evaluate(&tick).is_empty());
    }

    #[test]
    fn test_serde_round_trip_keeps_variant() {
        let s = price_target(true);
        let json = serde_json::to_string(&s).unwrap();
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
