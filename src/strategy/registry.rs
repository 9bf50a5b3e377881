//! In-memory strategy registry
//!
//! Owned by the engine and shared with the scheduler and the service facade.
//! Each strategy sits behind its own mutex so evaluation of one strategy
//! never blocks another.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::{Strategy, StrategyStatus};

pub type SharedStrategy = Arc<Mutex<Strategy>>;

#[derive(Debug, Default)]
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, SharedStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace by id
    pub async fn insert(&self, strategy: Strategy) -> SharedStrategy {
        let id = strategy.id.clone();
        let shared = Arc::new(Mutex::new(strategy));
        self.strategies.write().await.insert(id, shared.clone());
        shared
    }

    pub async fn get(&self, id: &str) -> Option<SharedStrategy> {
        self.strategies.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.strategies.read().await.contains_key(id)
    }

    pub async fn remove(&self, id: &str) -> Option<SharedStrategy> {
        self.strategies.write().await.remove(id)
    }

    /// Handles registered at this instant. Later inserts are not included.
    pub async fn snapshot(&self) -> Vec<SharedStrategy> {
        self.strategies.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.strategies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.strategies.read().await.is_empty()
    }

    /// Status of every strategy, optionally restricted to some wallets
    pub async fn statuses(&self, wallets: Option<&[String]>) -> Vec<StrategyStatus> {
        let mut out = Vec::new();
        for shared in self.snapshot().await {
            let strategy = shared.lock().await;
            if let Some(wallets) = wallets {
                if !wallets.contains(&strategy.wallet_address) {
                    continue;
                }
            }
            out.push(strategy.status());
        }
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::market;
    use crate::strategy::{AccumulationStrategy, StrategyKind};

    fn strategy(name: &str, wallet: &str) -> Strategy {
        Strategy::new(
            None,
            name.to_string(),
            wallet.to_string(),
            market(),
            false,
            StrategyKind::Accumulation(AccumulationStrategy::new(10.0, 60, None)),
        )
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let registry = StrategyRegistry::new();
        let s = strategy("dca", "w1");
        let id = s.id.clone();
        registry.insert(s).await;

        assert!(registry.contains(&id).await);
        assert_eq!(registry.get(&id).await.unwrap().lock().await.name, "dca");
        assert!(registry.remove(&id).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_excludes_later_inserts() {
        let registry = StrategyRegistry::new();
        registry.insert(strategy("a", "w1")).await;
        let snapshot = registry.snapshot().await;
        registry.insert(strategy("b", "w1")).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_statuses_filter_by_wallet() {
        let registry = StrategyRegistry::new();
        registry.insert(strategy("b", "w1")).await;
        registry.insert(strategy("a", "w1")).await;
        registry.insert(strategy("c", "w2")).await;

        let all = registry.statuses(None).await;
        assert_eq!(all.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let mine = registry.statuses(Some(&["w1".to_string()])).await;
        assert_eq!(mine.len(), 2);
    }
}
