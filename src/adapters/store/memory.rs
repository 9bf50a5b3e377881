//! In-memory order and strategy store
//!
//! Both tables live behind one `RwLock`. Every status change is validated
//! against the stored record while the write lock is held, which makes the
//! `pending -> executing` transition an exclusive gate. With a snapshot path
//! configured, the full state is atomically rewritten after each mutation
//! other than a price refresh, and reloaded by `open`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::domain::persistence::{read_json, write_json_atomic};
use crate::domain::{OrderStatus, TradeOrder};
use crate::ports::{OrderStore, StoreError, StrategyStore};
use crate::strategy::Strategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredStrategy {
    strategy: Strategy,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    orders: HashMap<String, TradeOrder>,
    #[serde(default)]
    strategies: HashMap<String, StoredStrategy>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// Volatile store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store persisted to `path`, loading the existing snapshot if any
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state: State = read_json(&path)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .unwrap_or_default();

        tracing::info!(
            "Loaded store snapshot {} ({} orders, {} strategies)",
            path.display(),
            state.orders.len(),
            state.strategies.len()
        );

        Ok(Self {
            state: RwLock::new(state),
            snapshot: Some(path),
        })
    }

    async fn persist(&self, state: &State) -> Result<(), StoreError> {
        match &self.snapshot {
            Some(path) => write_json_atomic(path, state)
                .await
                .map_err(|e| StoreError::Backend(e.to_string())),
            None => Ok(()),
        }
    }

    /// Apply `f` to a stored order under the write lock and persist
    async fn update_order<F>(&self, id: &str, f: F) -> Result<TradeOrder, StoreError>
    where
        F: FnOnce(&mut TradeOrder) -> Result<(), StoreError>,
    {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        // Mutate a copy so a rejected change leaves the record untouched
        let mut updated = order.clone();
        f(&mut updated)?;
        *order = updated.clone();

        self.persist(&state).await?;
        Ok(updated)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, order: TradeOrder) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate(order.id));
        }
        state.orders.insert(order.id.clone(), order);
        self.persist(&state).await
    }

    async fn get(&self, id: &str) -> Result<Option<TradeOrder>, StoreError> {
        Ok(self.state.read().await.orders.get(id).cloned())
    }

    async fn list(&self, wallet_address: Option<&str>) -> Result<Vec<TradeOrder>, StoreError> {
        let state = self.state.read().await;
        let mut orders: Vec<TradeOrder> = state
            .orders
            .values()
            .filter(|o| wallet_address.map_or(true, |w| o.wallet_address == w))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<TradeOrder>, StoreError> {
        let state = self.state.read().await;
        let mut orders: Vec<TradeOrder> = state
            .orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// Not snapshotted on its own; the next durable mutation writes it
    async fn record_price(&self, id: &str, price: f64) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        order.record_price(price);
        Ok(())
    }

    async fn begin_execution(&self, id: &str) -> Result<Option<TradeOrder>, StoreError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if order.status != OrderStatus::Pending {
            return Ok(None);
        }
        order.begin_execution()?;
        let claimed = order.clone();

        self.persist(&state).await?;
        Ok(Some(claimed))
    }

    async fn complete(
        &self,
        id: &str,
        executed_price: f64,
        tx_hash: String,
    ) -> Result<TradeOrder, StoreError> {
        self.update_order(id, |o| Ok(o.complete(executed_price, tx_hash)?)).await
    }

    async fn fail(&self, id: &str, message: String) -> Result<TradeOrder, StoreError> {
        self.update_order(id, |o| Ok(o.fail(message)?)).await
    }

    async fn retry(&self, id: &str) -> Result<TradeOrder, StoreError> {
        self.update_order(id, |o| Ok(o.retry()?)).await
    }

    async fn delete(&self, id: &str) -> Result<TradeOrder, StoreError> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        order.ensure_deletable()?;

        let removed = state.orders.remove(id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.persist(&state).await?;
        Ok(removed)
    }
}

#[async_trait]
impl StrategyStore for MemoryStore {
    async fn create(&self, strategy: &Strategy) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.strategies.contains_key(&strategy.id) {
            return Err(StoreError::Duplicate(strategy.id.clone()));
        }
        state.strategies.insert(
            strategy.id.clone(),
            StoredStrategy {
                strategy: strategy.clone(),
                archived: false,
            },
        );
        self.persist(&state).await
    }

    async fn save(&self, strategy: &Strategy) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let archived = state
            .strategies
            .get(&strategy.id)
            .map(|s| s.archived)
            .unwrap_or(false);
        state.strategies.insert(
            strategy.id.clone(),
            StoredStrategy {
                strategy: strategy.clone(),
                archived,
            },
        );
        self.persist(&state).await
    }

    async fn load_all(&self) -> Result<Vec<Strategy>, StoreError> {
        let state = self.state.read().await;
        let mut strategies: Vec<Strategy> = state
            .strategies
            .values()
            .filter(|s| !s.archived)
            .map(|s| s.strategy.clone())
            .collect();
        strategies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(strategies)
    }

    async fn archive(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let stored = state
            .strategies
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        stored.archived = true;
        self.persist(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Market, OrderError, OrderIntent, OrderSide, TriggerDirection};
    use crate::strategy::{PriceTargetStrategy, StrategyKind};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn market() -> Market {
        Market {
            pair: "MIN/ADA".to_string(),
            base_token: "token".to_string(),
            quote_token: "lovelace".to_string(),
            pool_id: "pool".to_string(),
        }
    }

    fn order(wallet: &str) -> TradeOrder {
        TradeOrder::new(
            wallet.to_string(),
            None,
            market(),
            OrderIntent {
                side: OrderSide::Buy,
                amount: 10.0,
                target_price: 1.0,
                trigger: TriggerDirection::Above,
            },
        )
        .unwrap()
    }

    fn strategy() -> Strategy {
        Strategy::new(
            None,
            "pt".to_string(),
            "w1".to_string(),
            market(),
            true,
            StrategyKind::PriceTarget(PriceTargetStrategy::new(1.0, 5.0, OrderSide::Buy, TriggerDirection::Above)),
        )
    }

    #[tokio::test]
    async fn test_insert_and_filter_by_wallet() {
        let store = MemoryStore::new();
        store.insert(order("w1")).await.unwrap();
        store.insert(order("w2")).await.unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 2);
        assert_eq!(store.list(Some("w1")).await.unwrap().len(), 1);
        assert_eq!(store.list_by_status(OrderStatus::Pending).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let store = MemoryStore::new();
        let o = order("w1");
        store.insert(o.clone()).await.unwrap();
        assert!(matches!(store.insert(o).await, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = MemoryStore::new();
        let o = order("w1");
        let id = o.id.clone();
        store.insert(o).await.unwrap();

        store.record_price(&id, 1.2).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().current_price, Some(1.2));

        let claimed = store.begin_execution(&id).await.unwrap().unwrap();
        assert_eq!(claimed.status, OrderStatus::Executing);
        assert!(store.begin_execution(&id).await.unwrap().is_none());

        let done = store.complete(&id, 1.25, "tx".to_string()).await.unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert_eq!(done.executed_price, Some(1.25));
        assert_eq!(done.tx_hash.as_deref(), Some("tx"));
    }

    #[tokio::test]
    async fn test_illegal_transition_leaves_record_untouched() {
        let store = MemoryStore::new();
        let o = order("w1");
        let id = o.id.clone();
        store.insert(o).await.unwrap();

        let err = store.complete(&id, 1.0, "tx".to_string()).await.unwrap_err();
        assert!(matches!(err, StoreError::Order(OrderError::InvalidTransition { .. })));
        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert!(stored.tx_hash.is_none());

        assert!(store.retry(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_retry_and_delete_rules() {
        let store = MemoryStore::new();
        let o = order("w1");
        let id = o.id.clone();
        store.insert(o).await.unwrap();
        store.begin_execution(&id).await.unwrap();

        assert!(matches!(store.delete(&id).await, Err(StoreError::Order(OrderError::NotDeletable(_)))));

        let failed = store.fail(&id, "boom".to_string()).await.unwrap();
        assert_eq!(failed.error_message.as_deref(), Some("boom"));

        let retried = store.retry(&id).await.unwrap();
        assert_eq!(retried.status, OrderStatus::Pending);
        assert!(retried.error_message.is_none());

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let o = order("w1");
        let id = o.id.clone();
        store.insert(o).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { store.begin_execution(&id).await.unwrap().is_some() }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_archive_hides_strategy() {
        let store = MemoryStore::new();
        let s = strategy();
        store.save(&s).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);

        store.archive(&s.id).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());

        // Saving an archived strategy keeps it archived
        store.save(&s).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(matches!(store.archive("nope").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let o = order("w1");
        let s = strategy();
        {
            let store = MemoryStore::open(&path).await.unwrap();
            store.insert(o.clone()).await.unwrap();
            store.save(&s).await.unwrap();
        }

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.get(&o.id).await.unwrap(), Some(o));
        assert_eq!(reopened.load_all().await.unwrap(), vec![s]);
    }

    #[tokio::test]
    async fn test_create_never_reuses_archived_id() {
        let store = MemoryStore::new();
        let s = strategy();
        store.create(&s).await.unwrap();
        assert!(matches!(store.create(&s).await, Err(StoreError::Duplicate(_))));

        store.archive(&s.id).await.unwrap();
        assert!(matches!(store.create(&s).await, Err(StoreError::Duplicate(_))));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_refresh_is_written_with_next_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let o = order("w1");
        let id = o.id.clone();

        let store = MemoryStore::open(&path).await.unwrap();
        store.insert(o).await.unwrap();
        store.record_price(&id, 1.1).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().current_price, Some(1.1));
        let on_disk = MemoryStore::open(&path).await.unwrap();
        assert_eq!(on_disk.get(&id).await.unwrap().unwrap().current_price, None);

        store.begin_execution(&id).await.unwrap();
        let on_disk = MemoryStore::open(&path).await.unwrap();
        assert_eq!(on_disk.get(&id).await.unwrap().unwrap().current_price, Some(1.1));
        assert!(matches!(store.record_price("nope", 1.0).await, Err(StoreError::NotFound(_))));
    }
}
