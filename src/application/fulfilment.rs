//! Order Fulfilment Loop
//!
//! Drains pending orders on its own schedule. For each order, independently:
//! 1. Re-read the live price; skip the order this tick if unavailable
//! 2. Check the trigger; if not met, record the price and move on
//! 3. Claim the order (`pending -> executing`), the exclusive gate
//! 4. Load the signing context, size the swap with slippage, submit
//! 5. Record `completed` with price and tx hash, or `failed` with the error
//!
//! A failure after the claim is terminal for that attempt. Only an explicit
//! retry puts the order back to `pending`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::error::EngineError;
use super::oracle::PriceOracle;
use super::ticker::{Periodic, TickGuard};
use crate::custody::WalletStore;
use crate::domain::{OrderStatus, TradeOrder};
use crate::ports::{ChainPort, EngineEvent, Notifier, OrderStep, OrderStore, SwapTransaction};

/// Result of processing one pending order
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    PriceUnavailable,
    Waiting { price: f64 },
    /// Another worker claimed the order first
    Contended,
    Completed { tx_hash: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FulfilmentReport {
    pub pending: usize,
    pub skipped: usize,
    pub waiting: usize,
    pub completed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl FulfilmentReport {
    fn add(&mut self, outcome: &OrderOutcome) {
        match outcome {
            OrderOutcome::PriceUnavailable | OrderOutcome::Contended => self.skipped += 1,
            OrderOutcome::Waiting { .. } => self.waiting += 1,
            OrderOutcome::Completed { .. } => self.completed += 1,
            OrderOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

struct Worker {
    oracle: Arc<PriceOracle>,
    orders: Arc<dyn OrderStore>,
    custody: Arc<WalletStore>,
    chain: Arc<dyn ChainPort>,
    notifier: Arc<dyn Notifier>,
    slippage_bps: u16,
}

pub struct FulfilmentLoop {
    worker: Arc<Worker>,
    guard: TickGuard,
}

impl FulfilmentLoop {
    pub fn new(
        oracle: Arc<PriceOracle>,
        orders: Arc<dyn OrderStore>,
        custody: Arc<WalletStore>,
        chain: Arc<dyn ChainPort>,
        notifier: Arc<dyn Notifier>,
        slippage_bps: u16,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                oracle,
                orders,
                custody,
                chain,
                notifier,
                slippage_bps,
            }),
            guard: TickGuard::new(),
        }
    }

    /// Process every pending order once. `None` when the previous tick is
    /// still running.
    pub async fn tick(&self) -> Option<FulfilmentReport> {
        let Some(_permit) = self.guard.try_enter() else {
            tracing::warn!("Previous fulfilment tick still running, skipping");
            return None;
        };

        let mut report = FulfilmentReport::default();
        let pending = match self.worker.orders.list_by_status(OrderStatus::Pending).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!("Failed to list pending orders: {}", e);
                report.errors += 1;
                return Some(report);
            }
        };
        report.pending = pending.len();

        let mut tasks = JoinSet::new();
        for order in pending {
            let worker = self.worker.clone();
            tasks.spawn(async move {
                let id = order.id.clone();
                (id, worker.process(order).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => report.add(&outcome),
                Ok((id, Err(e))) => {
                    tracing::error!("Order {} processing error: {}", id, e);
                    report.errors += 1;
                }
                Err(e) => {
                    tracing::error!("Order processing task aborted: {}", e);
                    report.errors += 1;
                }
            }
        }

        if report.pending > 0 {
            tracing::debug!(
                "Fulfilment tick: {} pending, {} completed, {} failed, {} waiting, {} skipped",
                report.pending,
                report.completed,
                report.failed,
                report.waiting,
                report.skipped
            );
        }
        Some(report)
    }
}

#[async_trait]
impl Periodic for FulfilmentLoop {
    fn name(&self) -> &'static str {
        "Order fulfilment loop"
    }

    async fn run_tick(&self) {
        self.tick().await;
    }
}

impl Worker {
    fn step(&self, order_id: &str, step: OrderStep, message: String) {
        self.notifier.notify(EngineEvent::OrderStep {
            order_id: order_id.to_string(),
            step,
            message,
        });
    }

    fn status_changed(&self, order: &TradeOrder, from: OrderStatus, message: Option<String>) {
        self.notifier.notify(EngineEvent::OrderStatusChanged {
            order_id: order.id.clone(),
            wallet_address: order.wallet_address.clone(),
            from,
            to: order.status,
            message,
        });
    }

    async fn process(&self, order: TradeOrder) -> Result<OrderOutcome, EngineError> {
        let price = match self.oracle.price(&order.pool_id, &order.base_token).await {
            Ok(price) => price,
            Err(e) => {
                tracing::debug!("Order {}: price unavailable, retrying next tick: {}", order.id, e);
                return Ok(OrderOutcome::PriceUnavailable);
            }
        };
        self.step(
            &order.id,
            OrderStep::PriceCheck,
            format!("price {:.6} vs target {:.6} ({:?})", price, order.target_price, order.trigger),
        );

        if !order.is_triggered(price) {
            self.orders.record_price(&order.id, price).await?;
            return Ok(OrderOutcome::Waiting { price });
        }

        let Some(claimed) = self.orders.begin_execution(&order.id).await? else {
            return Ok(OrderOutcome::Contended);
        };
        tracing::info!(
            "Order {} triggered: {} {} at {:.6} (target {:.6})",
            claimed.id,
            claimed.side,
            claimed.amount,
            price,
            claimed.target_price
        );
        self.status_changed(&claimed, OrderStatus::Pending, None);

        match self.execute(&claimed).await {
            Ok(tx_hash) => {
                let done = self.orders.complete(&claimed.id, price, tx_hash.clone()).await?;
                tracing::info!("Order {} completed: tx {}", done.id, tx_hash);
                self.status_changed(&done, OrderStatus::Executing, Some(tx_hash.clone()));
                Ok(OrderOutcome::Completed { tx_hash })
            }
            Err(e) => {
                let error = e.to_string();
                let failed = self.orders.fail(&claimed.id, error.clone()).await?;
                tracing::error!("Order {} failed: {}", failed.id, error);
                self.status_changed(&failed, OrderStatus::Executing, Some(error.clone()));
                Ok(OrderOutcome::Failed { error })
            }
        }
    }

    /// Everything after the claim. Any error here fails the order.
    async fn execute(&self, order: &TradeOrder) -> Result<String, EngineError> {
        let signer = self.custody.load_wallet(&order.wallet_address).await?;
        self.step(&order.id, OrderStep::WalletLoad, format!("loaded wallet {}", signer.address));

        let quote = self
            .oracle
            .quote_swap(&order.pool_id, &order.base_token, order.side, order.amount, self.slippage_bps)
            .await?;

        let swap = SwapTransaction {
            pool_id: quote.pool_id,
            sender: signer.address.clone(),
            asset_in: quote.asset_in,
            asset_out: quote.asset_out,
            amount_in: quote.amount_in,
            min_amount_out: quote.min_out,
        };
        self.step(
            &order.id,
            OrderStep::Submission,
            format!("submitting swap of {} {} (min out {})", swap.amount_in, swap.asset_in, swap.min_amount_out),
        );

        Ok(self.chain.submit_swap(&signer, &swap).await?)
    }
}
