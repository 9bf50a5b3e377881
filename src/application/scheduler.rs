//! Strategy Scheduler
//!
//! Each tick evaluates every registered strategy concurrently. The set of
//! strategies is the registry snapshot taken when the tick starts. A failing
//! or panicking strategy is logged with its name and never affects the
//! others in the same tick.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::error::EngineError;
use super::oracle::PriceOracle;
use super::ticker::{Periodic, TickGuard};
use crate::domain::TradeOrder;
use crate::ports::{EngineEvent, Notifier, OrderStore, StrategyStore};
use crate::strategy::registry::SharedStrategy;
use crate::strategy::{Effect, OrderSnapshot, Strategy, StrategyRegistry, Tick};

/// What happened to one strategy in one tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyOutcome {
    pub evaluated: bool,
    pub orders_placed: Vec<String>,
    pub deactivated: bool,
}

/// Summary of one scheduler tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchedulerReport {
    pub evaluated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub orders_placed: usize,
    pub deactivated: usize,
}

impl SchedulerReport {
    fn add(&mut self, outcome: &StrategyOutcome) {
        if outcome.evaluated {
            self.evaluated += 1;
        } else {
            self.skipped += 1;
        }
        self.orders_placed += outcome.orders_placed.len();
        if outcome.deactivated {
            self.deactivated += 1;
        }
    }
}

/// Collaborators shared by the per-strategy evaluation tasks
struct Context {
    oracle: Arc<PriceOracle>,
    orders: Arc<dyn OrderStore>,
    strategies: Arc<dyn StrategyStore>,
    notifier: Arc<dyn Notifier>,
}

pub struct StrategyScheduler {
    registry: Arc<StrategyRegistry>,
    ctx: Arc<Context>,
    guard: TickGuard,
}

impl StrategyScheduler {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        oracle: Arc<PriceOracle>,
        orders: Arc<dyn OrderStore>,
        strategies: Arc<dyn StrategyStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            ctx: Arc::new(Context {
                oracle,
                orders,
                strategies,
                notifier,
            }),
            guard: TickGuard::new(),
        }
    }

    /// Run one evaluation cycle. `None` when the previous cycle is still
    /// running.
    pub async fn tick(&self) -> Option<SchedulerReport> {
        let Some(_permit) = self.guard.try_enter() else {
            tracing::warn!("Previous strategy tick still running, skipping");
            return None;
        };

        let snapshot = self.registry.snapshot().await;
        let mut tasks = JoinSet::new();
        for shared in snapshot {
            let ctx = self.ctx.clone();
            tasks.spawn(async move { ctx.evaluate(shared).await });
        }

        let mut report = SchedulerReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => report.add(&outcome),
                Ok(Err(())) => report.failed += 1,
                Err(e) => {
                    tracing::error!("Strategy evaluation task aborted: {}", e);
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            "Strategy tick: {} evaluated, {} skipped, {} failed, {} orders placed",
            report.evaluated,
            report.skipped,
            report.failed,
            report.orders_placed
        );
        Some(report)
    }
}

#[async_trait]
impl Periodic for StrategyScheduler {
    fn name(&self) -> &'static str {
        "Strategy scheduler"
    }

    async fn run_tick(&self) {
        self.tick().await;
    }
}

impl Context {
    /// Evaluate one strategy, logging and reporting any failure
    async fn evaluate(&self, shared: SharedStrategy) -> Result<StrategyOutcome, ()> {
        let mut strategy = shared.lock().await;
        if !strategy.is_active {
            return Ok(StrategyOutcome::default());
        }

        let id = strategy.id.clone();
        let name = strategy.name.clone();
        match self.evaluate_locked(&mut strategy).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!("Strategy '{}' ({}) failed: {}", name, id, e);
                self.notifier.notify(EngineEvent::StrategyError {
                    strategy_id: id,
                    strategy_name: name,
                    error: e.to_string(),
                });
                Err(())
            }
        }
    }

    async fn evaluate_locked(
        &self,
        strategy: &mut Strategy,
    ) -> Result<StrategyOutcome, EngineError> {
        let price = match self
            .oracle
            .price(&strategy.market.pool_id, &strategy.market.base_token)
            .await
        {
            Ok(price) => Some(price),
            Err(e) => {
                tracing::warn!("Strategy '{}': price unavailable: {}", strategy.name, e);
                None
            }
        };
        if price.is_none() && strategy.kind.needs_price() {
            return Ok(StrategyOutcome::default());
        }

        let mut orders = HashMap::new();
        for order_id in strategy.tracked_orders() {
            if let Some(order) = self.orders.get(&order_id).await? {
                orders.insert(order_id, OrderSnapshot::from(&order));
            }
        }

        let now = Utc::now();
        let tick = Tick { now, price, orders };
        let effects = strategy.evaluate(&tick);

        let mut outcome = StrategyOutcome {
            evaluated: true,
            ..Default::default()
        };

        for effect in effects {
            match effect {
                Effect::PlaceOrder { slot, intent } => {
                    let order = TradeOrder::new(
                        strategy.wallet_address.clone(),
                        Some(strategy.id.clone()),
                        strategy.market.clone(),
                        intent,
                    )?;
                    self.orders.insert(order.clone()).await?;
                    tracing::info!(
                        "Strategy '{}' placed {} order {} ({} @ {:.6})",
                        strategy.name,
                        order.side,
                        order.id,
                        order.amount,
                        order.target_price
                    );

                    let deactivated = strategy.on_order_placed(slot, &order.id, now);
                    outcome.orders_placed.push(order.id.clone());
                    self.notifier.notify(EngineEvent::StrategyOrderPlaced {
                        strategy_id: strategy.id.clone(),
                        strategy_name: strategy.name.clone(),
                        order_id: order.id.clone(),
                    });
                    self.notifier.notify(EngineEvent::OrderCreated { order });

                    if let Some(reason) = deactivated {
                        outcome.deactivated = true;
                        self.notify_deactivated(strategy, reason);
                    }
                }
                Effect::Deactivate { reason } => {
                    outcome.deactivated = true;
                    self.notify_deactivated(strategy, reason);
                }
            }
        }

        self.strategies.save(strategy).await?;
        Ok(outcome)
    }

    fn notify_deactivated(&self, strategy: &Strategy, reason: String) {
        self.notifier.notify(EngineEvent::StrategyDeactivated {
            strategy_id: strategy.id.clone(),
            strategy_name: strategy.name.clone(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::MemoryStore;
    use crate::domain::{Market, OrderSide, OrderStatus, TriggerDirection};
    use crate::ports::mocks::{MockDex, RecordingNotifier};
    use crate::ports::StoreError;
    use crate::strategy::{AccumulationStrategy, PriceTargetStrategy, StopLossTakeProfitStrategy, StrategyKind};

    const TOKEN: &str = "policyMIN";

    struct Harness {
        dex: Arc<MockDex>,
        store: Arc<MemoryStore>,
        registry: Arc<StrategyRegistry>,
        notifier: RecordingNotifier,
        scheduler: StrategyScheduler,
    }

    fn harness(price: f64) -> Harness {
        let dex = Arc::new(MockDex::new().with_price("pool", TOKEN, price));
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(StrategyRegistry::new());
        let notifier = RecordingNotifier::new();
        let scheduler = StrategyScheduler::new(
            registry.clone(),
            Arc::new(PriceOracle::new(dex.clone())),
            store.clone(),
            store.clone(),
            Arc::new(notifier.clone()),
        );
        Harness { dex, store, registry, notifier, scheduler }
    }

    fn market(pool: &str) -> Market {
        Market {
            pair: "MIN/ADA".to_string(),
            base_token: TOKEN.to_string(),
            quote_token: "lovelace".to_string(),
            pool_id: pool.to_string(),
        }
    }

    fn price_target(name: &str, pool: &str) -> Strategy {
        Strategy::new(
            None,
            name.to_string(),
            "wallet-1".to_string(),
            market(pool),
            true,
            StrategyKind::PriceTarget(PriceTargetStrategy::new(2.0, 100.0, OrderSide::Buy, TriggerDirection::Above)),
        )
    }

    #[tokio::test]
    async fn test_condition_met_places_one_attributed_order() {
        let h = harness(2.5);
        let s = price_target("pt", "pool");
        let id = s.id.clone();
        h.registry.insert(s).await;

        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.orders_placed, 1);

        let orders = h.store.list(None).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].strategy_id.as_deref(), Some(id.as_str()));
        assert_eq!(orders[0].trigger, TriggerDirection::Above);
        assert_eq!(orders[0].target_price, 2.0);
        assert_eq!(orders[0].amount, 100.0);

        // Still pending: a second tick must not duplicate it
        h.scheduler.tick().await.unwrap();
        assert_eq!(h.store.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_condition_not_met_places_nothing() {
        let h = harness(1.5);
        h.registry.insert(price_target("pt", "pool")).await;
        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.orders_placed, 0);
        assert_eq!(report.evaluated, 1);
        assert!(h.store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oracle_failure_skips_without_state_change() {
        let h = harness(2.5);
        h.dex.set_unavailable("pool");
        let s = price_target("pt", "pool");
        let id = s.id.clone();
        let shared = h.registry.insert(s).await;

        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(shared.lock().await.last_evaluated_at.is_none());
        assert!(h.store.load_all().await.unwrap().iter().all(|s| s.id != id));
    }

    #[tokio::test]
    async fn test_inactive_strategy_not_evaluated() {
        let h = harness(2.5);
        let mut s = price_target("pt", "pool");
        s.is_active = false;
        h.registry.insert(s).await;
        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert!(h.store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_isolated_per_strategy() {
        let h = harness(2.5);
        // Empty wallet address makes order construction fail
        let mut broken = price_target("broken", "pool");
        broken.wallet_address.clear();
        h.registry.insert(broken).await;
        h.registry.insert(price_target("healthy", "pool")).await;

        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.orders_placed, 1);
        assert!(h.notifier.events().iter().any(|e| matches!(
            e,
            EngineEvent::StrategyError { strategy_name, .. } if strategy_name == "broken"
        )));
    }

    #[tokio::test]
    async fn test_execute_once_deactivates_after_completion() {
        let h = harness(2.5);
        let shared = h.registry.insert(price_target("pt", "pool")).await;
        h.scheduler.tick().await.unwrap();

        let order = h.store.list(None).await.unwrap().remove(0);
        h.store.begin_execution(&order.id).await.unwrap();
        h.store.complete(&order.id, 2.5, "tx".to_string()).await.unwrap();

        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.deactivated, 1);
        assert!(!shared.lock().await.is_active);

        let persisted = h.store.load_all().await.unwrap();
        assert!(!persisted[0].is_active);
        assert!(h.notifier.events().iter().any(|e| matches!(e, EngineEvent::StrategyDeactivated { .. })));
    }

    #[tokio::test]
    async fn test_accumulation_second_tick_within_interval_is_noop() {
        let h = harness(1.0);
        let s = Strategy::new(
            None,
            "dca".to_string(),
            "wallet-1".to_string(),
            market("pool"),
            false,
            StrategyKind::Accumulation(AccumulationStrategy::new(25.0, 60, None)),
        );
        h.registry.insert(s).await;

        h.scheduler.tick().await.unwrap();
        let order = h.store.list(None).await.unwrap().remove(0);
        h.store.begin_execution(&order.id).await.unwrap();
        h.store.complete(&order.id, 1.0, "tx".to_string()).await.unwrap();

        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.orders_placed, 0);
        assert_eq!(h.store.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_loss_places_and_deactivates_same_tick() {
        let h = harness(1.5);
        let s = Strategy::new(
            None,
            "guard".to_string(),
            "wallet-1".to_string(),
            market("pool"),
            true,
            StrategyKind::StopLossTakeProfit(StopLossTakeProfitStrategy::new(2.0, 10.0, 20.0, 50.0)),
        );
        let shared = h.registry.insert(s).await;

        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.orders_placed, 1);
        assert_eq!(report.deactivated, 1);
        assert!(!shared.lock().await.is_active);

        let order = h.store.list(None).await.unwrap().remove(0);
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_deleted_order_lets_strategy_place_again() {
        let h = harness(2.5);
        let mut s = price_target("pt", "pool");
        s.execute_once = false;
        h.registry.insert(s).await;

        h.scheduler.tick().await.unwrap();
        let order = h.store.list(None).await.unwrap().remove(0);
        h.store.delete(&order.id).await.unwrap();

        // Reference cleared this tick, new order the next
        h.scheduler.tick().await.unwrap();
        h.scheduler.tick().await.unwrap();
        assert_eq!(h.store.list(None).await.unwrap().len(), 1);
        assert!(matches!(h.store.delete("missing").await, Err(StoreError::NotFound(_))));
    }
}
