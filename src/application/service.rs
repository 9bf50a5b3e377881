//! Trading service facade
//!
//! The contract handed to the routing layer. Every operation takes the
//! authenticated owner address and returns an `ApiResponse` envelope:
//! `{ "success": true, "data": ... }` or `{ "success": false, "error": "..." }`.
//! Failures never surface as panics or raw errors.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::engine::{Engine, NewStrategy};
use super::error::EngineError;
use crate::custody::CreatedWallet;
use crate::domain::{
    AssetAmount, Market, OrderIntent, OrderSide, TradeOrder, TriggerDirection, WalletSummary, LOVELACE,
};
use crate::strategy::{
    AccumulationStrategy, GridStrategy, PriceTargetStrategy, StopLossTakeProfitStrategy, StrategyKind,
    StrategyStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T> From<Result<T, EngineError>> for ApiResponse<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => {
                if e.is_client_error() {
                    tracing::debug!("Request rejected: {}", e);
                } else {
                    tracing::error!("Request failed: {}", e);
                }
                ApiResponse::err(e.to_string())
            }
        }
    }
}

fn default_quote() -> String {
    LOVELACE.to_string()
}

/// Fields shared by every strategy creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub wallet_address: String,
    pub pair: String,
    pub base_token: String,
    #[serde(default = "default_quote")]
    pub quote_token: String,
    pub pool_id: String,
    #[serde(default)]
    pub execute_once: Option<bool>,
}

impl StrategyRequest {
    fn into_new(self, default_execute_once: bool, kind: StrategyKind) -> NewStrategy {
        NewStrategy {
            id: self.id,
            name: self.name,
            wallet_address: self.wallet_address,
            market: Market {
                pair: self.pair,
                base_token: self.base_token,
                quote_token: self.quote_token,
                pool_id: self.pool_id,
            },
            execute_once: self.execute_once.unwrap_or(default_execute_once),
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePriceTargetRequest {
    #[serde(flatten)]
    pub strategy: StrategyRequest,
    pub target_price: f64,
    pub amount: f64,
    pub side: OrderSide,
    pub trigger_direction: TriggerDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccumulationRequest {
    #[serde(flatten)]
    pub strategy: StrategyRequest,
    pub amount_per_run: f64,
    pub interval_minutes: u64,
    #[serde(default)]
    pub max_runs: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGridRequest {
    #[serde(flatten)]
    pub strategy: StrategyRequest,
    pub lower_price: f64,
    pub upper_price: f64,
    pub grid_levels: usize,
    pub investment_per_level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStopLossRequest {
    #[serde(flatten)]
    pub strategy: StrategyRequest,
    pub entry_price: f64,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    pub position_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub wallet_address: String,
    pub pair: String,
    pub base_token: String,
    #[serde(default = "default_quote")]
    pub quote_token: String,
    pub pool_id: String,
    pub side: OrderSide,
    pub amount: f64,
    pub target_price: f64,
    pub trigger_direction: TriggerDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub wallet_address: String,
    pub to_address: String,
    pub assets: Vec<AssetAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedWallet {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipCheck {
    pub wallet_address: String,
    pub owner_address: String,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub wallet_address: String,
    pub assets: Vec<AssetAmount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub tx_hash: String,
}

#[derive(Clone)]
pub struct TradingService {
    engine: Arc<Engine>,
}

impl TradingService {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub async fn create_price_target_strategy(
        &self,
        owner: &str,
        req: CreatePriceTargetRequest,
    ) -> ApiResponse<StrategyStatus> {
        let kind = StrategyKind::PriceTarget(PriceTargetStrategy::new(
            req.target_price,
            req.amount,
            req.side,
            req.trigger_direction,
        ));
        self.engine.create_strategy(owner, req.strategy.into_new(true, kind)).await.into()
    }

    pub async fn create_accumulation_strategy(
        &self,
        owner: &str,
        req: CreateAccumulationRequest,
    ) -> ApiResponse<StrategyStatus> {
        let kind = StrategyKind::Accumulation(AccumulationStrategy::new(
            req.amount_per_run,
            req.interval_minutes,
            req.max_runs,
        ));
        self.engine.create_strategy(owner, req.strategy.into_new(false, kind)).await.into()
    }

    pub async fn create_grid_strategy(&self, owner: &str, req: CreateGridRequest) -> ApiResponse<StrategyStatus> {
        let kind = StrategyKind::Grid(GridStrategy::new(
            req.lower_price,
            req.upper_price,
            req.grid_levels,
            req.investment_per_level,
        ));
        self.engine.create_strategy(owner, req.strategy.into_new(false, kind)).await.into()
    }

    pub async fn create_stop_loss_strategy(
        &self,
        owner: &str,
        req: CreateStopLossRequest,
    ) -> ApiResponse<StrategyStatus> {
        let kind = StrategyKind::StopLossTakeProfit(StopLossTakeProfitStrategy::new(
            req.entry_price,
            req.stop_loss_percent,
            req.take_profit_percent,
            req.position_amount,
        ));
        self.engine.create_strategy(owner, req.strategy.into_new(true, kind)).await.into()
    }

    pub async fn list_strategies(&self, owner: &str) -> ApiResponse<Vec<StrategyStatus>> {
        self.engine.list_strategies(owner).await.into()
    }

    pub async fn stop_strategy(&self, owner: &str, id: &str) -> ApiResponse<StrategyStatus> {
        self.engine.set_strategy_active(owner, id, false).await.into()
    }

    pub async fn start_strategy(&self, owner: &str, id: &str) -> ApiResponse<StrategyStatus> {
        self.engine.set_strategy_active(owner, id, true).await.into()
    }

    pub async fn delete_strategy(&self, owner: &str, id: &str) -> ApiResponse<()> {
        self.engine.delete_strategy(owner, id).await.into()
    }

    pub async fn create_order(&self, owner: &str, req: CreateOrderRequest) -> ApiResponse<TradeOrder> {
        let market = Market {
            pair: req.pair,
            base_token: req.base_token,
            quote_token: req.quote_token,
            pool_id: req.pool_id,
        };
        let intent = OrderIntent {
            side: req.side,
            amount: req.amount,
            target_price: req.target_price,
            trigger: req.trigger_direction,
        };
        self.engine
            .create_order(owner, &req.wallet_address, market, intent)
            .await
            .into()
    }

    pub async fn list_orders(&self, owner: &str, wallet_address: Option<&str>) -> ApiResponse<Vec<TradeOrder>> {
        self.engine.list_orders(owner, wallet_address).await.into()
    }

    pub async fn get_order(&self, owner: &str, id: &str) -> ApiResponse<TradeOrder> {
        self.engine.get_order(owner, id).await.into()
    }

    pub async fn delete_order(&self, owner: &str, id: &str) -> ApiResponse<TradeOrder> {
        self.engine.delete_order(owner, id).await.into()
    }

    pub async fn retry_order(&self, owner: &str, id: &str) -> ApiResponse<TradeOrder> {
        self.engine.retry_order(owner, id).await.into()
    }

    pub async fn create_wallet(&self, owner: &str) -> ApiResponse<CreatedWallet> {
        self.engine.create_wallet(owner).await.into()
    }

    pub async fn import_wallet(&self, owner: &str, mnemonic: &str) -> ApiResponse<ImportedWallet> {
        self.engine
            .import_wallet(owner, mnemonic)
            .await
            .map(|address| ImportedWallet { address })
            .into()
    }

    pub async fn list_wallets(&self, owner: &str) -> ApiResponse<Vec<WalletSummary>> {
        self.engine.list_wallets(owner).await.into()
    }

    pub async fn verify_ownership(&self, owner: &str, wallet_address: &str) -> ApiResponse<OwnershipCheck> {
        let is_owner = self.engine.verify_ownership(owner, wallet_address).await;
        ApiResponse::ok(OwnershipCheck {
            wallet_address: wallet_address.to_string(),
            owner_address: owner.to_string(),
            is_owner,
        })
    }

    pub async fn get_balance(&self, owner: &str, wallet_address: &str) -> ApiResponse<Balance> {
        self.engine
            .balance(owner, wallet_address)
            .await
            .map(|assets| Balance {
                wallet_address: wallet_address.to_string(),
                assets,
            })
            .into()
    }

    pub async fn withdraw(&self, owner: &str, req: WithdrawRequest) -> ApiResponse<Withdrawal> {
        self.engine
            .withdraw(owner, &req.wallet_address, &req.to_address, req.assets)
            .await
            .map(|tx_hash| Withdrawal { tx_hash })
            .into()
    }
}
