//! Engine
//!
//! The single owner of the strategy registry, both periodic loops and every
//! collaborator. Built once at process start and shared with request
//! handlers. The two loops never reference each other; they coordinate only
//! through the order and strategy stores.
//!
//! Every operation taking an `owner` first proves wallet ownership through
//! the custody store; validation and authorization failures return before
//! anything is written.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::error::EngineError;
use super::fulfilment::FulfilmentLoop;
use super::oracle::PriceOracle;
use super::scheduler::StrategyScheduler;
use super::ticker::Ticker;
use crate::custody::{CreatedWallet, WalletStore};
use crate::domain::{
    aggregate_balance, validate_address, AssetAmount, Market, OrderIntent, OrderStatus, TradeOrder,
    WalletSummary,
};
use crate::ports::{
    ChainPort, DexPort, EngineEvent, Notifier, OrderStore, StrategyStore, TransferRequest,
};
use crate::strategy::{Strategy, StrategyKind, StrategyRegistry, StrategyStatus};

/// Loop periods and execution parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub strategy_interval: Duration,
    pub order_interval: Duration,
    pub slippage_bps: u16,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            strategy_interval: Duration::from_secs(30),
            order_interval: Duration::from_secs(10),
            slippage_bps: 100,
        }
    }
}

/// Everything a new strategy needs besides its id
#[derive(Debug, Clone)]
pub struct NewStrategy {
    pub id: Option<String>,
    pub name: String,
    pub wallet_address: String,
    pub market: Market,
    pub execute_once: bool,
    pub kind: StrategyKind,
}

pub struct Engine {
    settings: EngineSettings,
    registry: Arc<StrategyRegistry>,
    oracle: Arc<PriceOracle>,
    orders: Arc<dyn OrderStore>,
    strategies: Arc<dyn StrategyStore>,
    custody: Arc<WalletStore>,
    chain: Arc<dyn ChainPort>,
    notifier: Arc<dyn Notifier>,
    scheduler: Arc<StrategyScheduler>,
    fulfilment: Arc<FulfilmentLoop>,
    strategy_ticker: Ticker,
    order_ticker: Ticker,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: EngineSettings,
        dex: Arc<dyn DexPort>,
        chain: Arc<dyn ChainPort>,
        orders: Arc<dyn OrderStore>,
        strategies: Arc<dyn StrategyStore>,
        custody: Arc<WalletStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = Arc::new(StrategyRegistry::new());
        let oracle = Arc::new(PriceOracle::new(dex));

        let scheduler = Arc::new(StrategyScheduler::new(
            registry.clone(),
            oracle.clone(),
            orders.clone(),
            strategies.clone(),
            notifier.clone(),
        ));
        let fulfilment = Arc::new(FulfilmentLoop::new(
            oracle.clone(),
            orders.clone(),
            custody.clone(),
            chain.clone(),
            notifier.clone(),
            settings.slippage_bps,
        ));

        Self {
            strategy_ticker: Ticker::new(settings.strategy_interval),
            order_ticker: Ticker::new(settings.order_interval),
            settings,
            registry,
            oracle,
            orders,
            strategies,
            custody,
            chain,
            notifier,
            scheduler,
            fulfilment,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<StrategyRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<StrategyScheduler> {
        &self.scheduler
    }

    pub fn fulfilment(&self) -> &Arc<FulfilmentLoop> {
        &self.fulfilment
    }

    pub fn oracle(&self) -> &Arc<PriceOracle> {
        &self.oracle
    }

    pub fn custody(&self) -> &Arc<WalletStore> {
        &self.custody
    }

    /// Reload persisted strategies and start both loops. A second call while
    /// running only logs a warning.
    pub async fn start(&self) -> Result<usize, EngineError> {
        if self.strategy_ticker.is_running().await {
            tracing::warn!("Engine already running, ignoring start");
            return Ok(0);
        }

        let loaded = self.load_persisted().await?;
        self.strategy_ticker.start(self.scheduler.clone()).await;
        self.order_ticker.start(self.fulfilment.clone()).await;
        Ok(loaded)
    }

    /// Reload persisted strategies, then run one strategy tick followed by
    /// one fulfilment tick without starting the loops.
    pub async fn run_once(&self) -> Result<usize, EngineError> {
        let loaded = self.load_persisted().await?;
        if let Some(report) = self.scheduler.tick().await {
            tracing::info!("Strategy pass: {:?}", report);
        }
        if let Some(report) = self.fulfilment.tick().await {
            tracing::info!("Fulfilment pass: {:?}", report);
        }
        Ok(loaded)
    }

    async fn load_persisted(&self) -> Result<usize, EngineError> {
        let mut loaded = 0;
        for strategy in self.strategies.load_all().await? {
            if !strategy.validate() {
                tracing::warn!(
                    "Skipping persisted {} strategy {} with invalid configuration",
                    strategy.kind.label(),
                    strategy.id
                );
                continue;
            }
            if !self.registry.contains(&strategy.id).await {
                self.registry.insert(strategy).await;
                loaded += 1;
            }
        }
        tracing::info!("Loaded {} persisted strategies", loaded);
        Ok(loaded)
    }

    /// Stop both loops. Work already in flight finishes.
    pub async fn stop(&self) {
        self.strategy_ticker.stop().await;
        self.order_ticker.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.strategy_ticker.is_running().await || self.order_ticker.is_running().await
    }

    async fn authorize(&self, owner: &str, wallet_address: &str) -> Result<(), EngineError> {
        validate_address(wallet_address)?;
        if self.custody.verify_wallet_ownership(wallet_address, owner).await {
            Ok(())
        } else {
            tracing::warn!("Ownership check failed: {} does not own {}", owner, wallet_address);
            Err(EngineError::Unauthorized(format!(
                "wallet {} is not owned by {}",
                wallet_address, owner
            )))
        }
    }

    async fn owned_wallets(&self, owner: &str) -> Result<Vec<String>, EngineError> {
        Ok(self
            .custody
            .get_wallets_by_owner(owner)
            .await?
            .into_iter()
            .map(|w| w.address)
            .collect())
    }

    // ---- strategies ----

    pub async fn create_strategy(&self, owner: &str, new: NewStrategy) -> Result<StrategyStatus, EngineError> {
        let strategy = Strategy::new(
            new.id,
            new.name,
            new.wallet_address,
            new.market,
            new.execute_once,
            new.kind,
        );
        if !strategy.validate() {
            return Err(EngineError::Validation(format!(
                "invalid {} strategy configuration",
                strategy.kind.label()
            )));
        }
        if self.registry.contains(&strategy.id).await {
            return Err(EngineError::InvalidState(format!("strategy {} already exists", strategy.id)));
        }
        self.authorize(owner, &strategy.wallet_address).await?;

        self.strategies.create(&strategy).await?;
        tracing::info!(
            "Created {} strategy '{}' ({}) on {}",
            strategy.kind.label(),
            strategy.name,
            strategy.id,
            strategy.market.pair
        );
        let status = strategy.status();
        self.registry.insert(strategy).await;
        Ok(status)
    }

    /// Strategies on the owner's wallets, each with a fresh price when the
    /// oracle answers
    pub async fn list_strategies(&self, owner: &str) -> Result<Vec<StrategyStatus>, EngineError> {
        let wallets = self.owned_wallets(owner).await?;
        let mut statuses = self.registry.statuses(Some(&wallets)).await;

        let mut prices: HashMap<String, Option<f64>> = HashMap::new();
        for status in statuses.iter_mut() {
            let key = status.pool_id.clone();
            if !prices.contains_key(&key) {
                let base = match self.registry.get(&status.id).await {
                    Some(shared) => shared.lock().await.market.base_token.clone(),
                    None => continue,
                };
                prices.insert(key.clone(), self.oracle.price(&status.pool_id, &base).await.ok());
            }
            if let Some(Some(price)) = prices.get(&key) {
                status.current_price = Some(*price);
            }
        }
        Ok(statuses)
    }

    pub async fn set_strategy_active(
        &self,
        owner: &str,
        id: &str,
        active: bool,
    ) -> Result<StrategyStatus, EngineError> {
        let shared = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("strategy {}", id)))?;
        let wallet = shared.lock().await.wallet_address.clone();
        self.authorize(owner, &wallet).await?;

        let mut strategy = shared.lock().await;
        strategy.is_active = active;
        strategy.updated_at = chrono::Utc::now();
        self.strategies.save(&strategy).await?;
        tracing::info!(
            "Strategy '{}' {}",
            strategy.name,
            if active { "started" } else { "stopped" }
        );
        Ok(strategy.status())
    }

    /// Evict from the registry; the persisted record is archived, not erased
    pub async fn delete_strategy(&self, owner: &str, id: &str) -> Result<(), EngineError> {
        let shared = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("strategy {}", id)))?;
        let wallet = shared.lock().await.wallet_address.clone();
        self.authorize(owner, &wallet).await?;

        self.registry.remove(id).await;
        self.strategies.archive(id).await?;
        tracing::info!("Deleted strategy {}", id);
        Ok(())
    }

    // ---- orders ----

    pub async fn create_order(
        &self,
        owner: &str,
        wallet_address: &str,
        market: Market,
        intent: OrderIntent,
    ) -> Result<TradeOrder, EngineError> {
        let order = TradeOrder::new(wallet_address.to_string(), None, market, intent)?;
        self.authorize(owner, wallet_address).await?;

        self.orders.insert(order.clone()).await?;
        tracing::info!("Created order {} ({} {} on {})", order.id, order.side, order.amount, order.pair);
        self.notifier.notify(EngineEvent::OrderCreated { order: order.clone() });
        Ok(order)
    }

    /// Orders of one owned wallet, or of every wallet the owner holds
    pub async fn list_orders(&self, owner: &str, wallet_address: Option<&str>) -> Result<Vec<TradeOrder>, EngineError> {
        match wallet_address {
            Some(wallet) => {
                self.authorize(owner, wallet).await?;
                Ok(self.orders.list(Some(wallet)).await?)
            }
            None => {
                let wallets = self.owned_wallets(owner).await?;
                Ok(self
                    .orders
                    .list(None)
                    .await?
                    .into_iter()
                    .filter(|o| wallets.contains(&o.wallet_address))
                    .collect())
            }
        }
    }

    async fn owned_order(&self, owner: &str, id: &str) -> Result<TradeOrder, EngineError> {
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {}", id)))?;
        self.authorize(owner, &order.wallet_address).await?;
        Ok(order)
    }

    pub async fn get_order(&self, owner: &str, id: &str) -> Result<TradeOrder, EngineError> {
        self.owned_order(owner, id).await
    }

    /// Only `pending` and `failed` orders can be deleted
    pub async fn delete_order(&self, owner: &str, id: &str) -> Result<TradeOrder, EngineError> {
        let order = self.owned_order(owner, id).await?;
        order.ensure_deletable()?;
        let removed = self.orders.delete(id).await?;
        tracing::info!("Deleted order {}", id);
        Ok(removed)
    }

    /// `failed -> pending`; the only way an order is attempted again
    pub async fn retry_order(&self, owner: &str, id: &str) -> Result<TradeOrder, EngineError> {
        let order = self.owned_order(owner, id).await?;
        if order.status != OrderStatus::Failed {
            return Err(EngineError::InvalidState(format!(
                "only failed orders can be retried, order {} is {}",
                id, order.status
            )));
        }

        // A strategy's order goes back under that strategy's slot, or not at all
        let retried = match order.strategy_id.as_deref() {
            Some(strategy_id) => match self.registry.get(strategy_id).await {
                Some(shared) => {
                    let mut strategy = shared.lock().await;
                    let mut adopted = strategy.clone();
                    adopted.adopt_retried(&order).map_err(EngineError::InvalidState)?;
                    let retried = self.orders.retry(id).await?;
                    *strategy = adopted;
                    self.strategies.save(&strategy).await?;
                    retried
                }
                None => self.orders.retry(id).await?,
            },
            None => self.orders.retry(id).await?,
        };
        tracing::info!("Order {} reset to pending for retry", id);
        self.notifier.notify(EngineEvent::OrderStatusChanged {
            order_id: retried.id.clone(),
            wallet_address: retried.wallet_address.clone(),
            from: OrderStatus::Failed,
            to: retried.status,
            message: Some("retry requested".to_string()),
        });
        Ok(retried)
    }

    // ---- wallets ----

    pub async fn create_wallet(&self, owner: &str) -> Result<CreatedWallet, EngineError> {
        Ok(self.custody.create_wallet(owner).await?)
    }

    pub async fn import_wallet(&self, owner: &str, mnemonic: &str) -> Result<String, EngineError> {
        Ok(self.custody.add_wallet(mnemonic, owner).await?)
    }

    pub async fn list_wallets(&self, owner: &str) -> Result<Vec<WalletSummary>, EngineError> {
        Ok(self.custody.get_wallets_by_owner(owner).await?)
    }

    pub async fn verify_ownership(&self, owner: &str, wallet_address: &str) -> bool {
        self.custody.verify_wallet_ownership(wallet_address, owner).await
    }

    /// Per-asset totals over every UTXO at the wallet
    pub async fn balance(&self, owner: &str, wallet_address: &str) -> Result<Vec<AssetAmount>, EngineError> {
        self.authorize(owner, wallet_address).await?;
        let utxos = self.chain.utxos(wallet_address).await?;
        Ok(aggregate_balance(&utxos))
    }

    /// Send selected assets out of a custodial wallet; returns the tx hash
    pub async fn withdraw(
        &self,
        owner: &str,
        wallet_address: &str,
        to_address: &str,
        assets: Vec<AssetAmount>,
    ) -> Result<String, EngineError> {
        validate_address(to_address)?;
        if assets.is_empty() {
            return Err(EngineError::Validation("no assets selected".to_string()));
        }
        if let Some(bad) = assets.iter().find(|a| a.quantity == 0 || a.unit.is_empty()) {
            return Err(EngineError::Validation(format!("invalid asset amount for '{}'", bad.unit)));
        }
        self.authorize(owner, wallet_address).await?;

        let signer = self.custody.load_wallet(wallet_address).await?;
        let transfer = TransferRequest {
            from: wallet_address.to_string(),
            to: to_address.to_string(),
            assets,
        };
        let tx_hash = self.chain.submit_transfer(&signer, &transfer).await?;
        tracing::info!("Withdrawal from {} to {}: tx {}", wallet_address, to_address, tx_hash);
        Ok(tx_hash)
    }
}
