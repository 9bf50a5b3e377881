//! Chain gateway client
//!
//! Key derivation, transaction building and signing run in a local wallet
//! gateway (a sidecar wrapping the chain's serialization library). This
//! client forwards requests to it and maps its responses onto [`ChainPort`].
//! UTXO queries use the indexer shape `[{tx_hash, output_index, amount: [{unit, quantity}]}]`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapters::http::{read_json, send_with_retry, HttpError};
use crate::domain::{AssetAmount, Network, Utxo};
use crate::ports::{ChainError, ChainPort, SigningContext, SwapTransaction, TransferRequest};

pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8090";

#[derive(Debug, Clone)]
pub struct ChainGatewayConfig {
    pub api_base_url: String,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ChainGatewayConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_GATEWAY_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MnemonicResponse {
    mnemonic: String,
}

#[derive(Serialize)]
struct DeriveRequest<'a> {
    mnemonic: &'a str,
    network: Network,
}

#[derive(Debug, Deserialize)]
struct AddressResponse {
    address: String,
}

#[derive(Debug, Deserialize)]
struct RawAmount {
    unit: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct RawUtxo {
    tx_hash: String,
    output_index: u32,
    amount: Vec<RawAmount>,
}

impl TryFrom<RawUtxo> for Utxo {
    type Error = ChainError;

    fn try_from(raw: RawUtxo) -> Result<Self, Self::Error> {
        let amounts = raw
            .amount
            .into_iter()
            .map(|a| {
                let quantity = a.quantity.parse::<u128>().map_err(|e| {
                    ChainError::ApiError(format!("bad quantity '{}' for {}: {}", a.quantity, a.unit, e))
                })?;
                Ok(AssetAmount { unit: a.unit, quantity })
            })
            .collect::<Result<Vec<_>, ChainError>>()?;

        Ok(Utxo {
            tx_hash: raw.tx_hash,
            output_index: raw.output_index,
            amounts,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedRequest<'a, T: Serialize> {
    address: &'a str,
    network: Network,
    mnemonic: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    tx_hash: String,
}

/// HTTP implementation of [`ChainPort`]
#[derive(Clone)]
pub struct ChainGatewayClient {
    client: Client,
    config: ChainGatewayConfig,
}

impl ChainGatewayClient {
    pub fn new() -> Result<Self, ChainError> {
        Self::with_config(ChainGatewayConfig::default())
    }

    pub fn with_config(config: ChainGatewayConfig) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChainError::ApiError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ChainGatewayConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let request = self.authorize(self.client.post(self.url(path)).json(body));
        let response = send_with_retry(request, self.config.max_retries).await?;
        read_json(response).await
    }

    async fn submit<T: Serialize>(
        &self,
        path: &str,
        signer: &SigningContext,
        body: &T,
    ) -> Result<String, ChainError> {
        let request = SignedRequest {
            address: &signer.address,
            network: signer.network,
            mnemonic: signer.mnemonic(),
            body,
        };
        let response: SubmitResponse = self
            .post(path, &request)
            .await
            .map_err(submit_error)?;

        tracing::info!("Submitted transaction {} from {}", response.tx_hash, signer.address);
        Ok(response.tx_hash)
    }
}

fn submit_error(err: HttpError) -> ChainError {
    match err {
        HttpError::Status { status: 400, body } => ChainError::BuildError(body),
        HttpError::Status { status: 402, body } => ChainError::InsufficientFunds(body),
        HttpError::Status { status: 422, body } => ChainError::InvalidParameters(body),
        other => ChainError::SubmitError(other.to_string()),
    }
}

#[async_trait]
impl ChainPort for ChainGatewayClient {
    async fn generate_mnemonic(&self) -> Result<String, ChainError> {
        let response: MnemonicResponse = self
            .post("wallets/mnemonic", &serde_json::json!({ "words": 24 }))
            .await
            .map_err(|e| ChainError::DerivationError(e.to_string()))?;
        Ok(response.mnemonic)
    }

    async fn derive_address(&self, mnemonic: &str, network: Network) -> Result<String, ChainError> {
        let response: AddressResponse = self
            .post("wallets/address", &DeriveRequest { mnemonic, network })
            .await
            .map_err(|e| ChainError::DerivationError(e.to_string()))?;
        Ok(response.address)
    }

    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, ChainError> {
        let request = self.authorize(self.client.get(self.url(&format!("addresses/{}/utxos", address))));
        let result = match send_with_retry(request, self.config.max_retries).await {
            Ok(response) => read_json::<Vec<RawUtxo>>(response).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(raw) => raw.into_iter().map(Utxo::try_from).collect(),
            // Indexers answer 404 for an address that has never been used
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(ChainError::ApiError(e.to_string())),
        }
    }

    async fn submit_swap(&self, signer: &SigningContext, swap: &SwapTransaction) -> Result<String, ChainError> {
        if swap.sender != signer.address {
            return Err(ChainError::InvalidParameters(format!(
                "swap sender {} does not match signing wallet {}",
                swap.sender, signer.address
            )));
        }
        self.submit("transactions/swap", signer, swap).await
    }

    async fn submit_transfer(
        &self,
        signer: &SigningContext,
        transfer: &TransferRequest,
    ) -> Result<String, ChainError> {
        if transfer.from != signer.address {
            return Err(ChainError::InvalidParameters(format!(
                "transfer source {} does not match signing wallet {}",
                transfer.from, signer.address
            )));
        }
        self.submit("transactions/transfer", signer, transfer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ChainGatewayConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_GATEWAY_URL);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_client_creation() {
        let client = ChainGatewayClient::new().unwrap();
        assert_eq!(client.url("addresses/x/utxos"), "http://127.0.0.1:8090/addresses/x/utxos");

        let trailing = ChainGatewayClient::with_config(ChainGatewayConfig {
            api_base_url: "http://gateway:8090/".into(),
            ..ChainGatewayConfig::default()
        })
        .unwrap();
        assert_eq!(trailing.url("wallets/address"), "http://gateway:8090/wallets/address");
    }

    #[test]
    fn test_parse_utxos() {
        let json = r#"[{
            "tx_hash": "39a7a284c2a0948189dc45dec670211cd4d72f7b66c5726c08d9b3df11e44d58",
            "output_index": 1,
            "amount": [
                {"unit": "lovelace", "quantity": "42000000"},
                {"unit": "b0d07d45fe9514f80213f4020e5a61241458be626841cde717cb38a74d494e", "quantity": "12"}
            ],
            "block": "7eb8e27d18686c7db9a18f8bbcfe34e3fed6e047afaa2d969904d15e934847e6"
        }]"#;
        let raw: Vec<RawUtxo> = serde_json::from_str(json).unwrap();
        let utxo = Utxo::try_from(raw.into_iter().next().unwrap()).unwrap();
        assert_eq!(utxo.output_index, 1);
        assert_eq!(utxo.amounts.len(), 2);
        assert_eq!(utxo.amounts[0].quantity, 42_000_000);
    }

    #[test]
    fn test_parse_utxo_bad_quantity() {
        let raw = RawUtxo {
            tx_hash: "a".into(),
            output_index: 0,
            amount: vec![RawAmount { unit: "lovelace".into(), quantity: "-1".into() }],
        };
        assert!(matches!(Utxo::try_from(raw), Err(ChainError::ApiError(_))));
    }

    #[test]
    fn test_submit_error_mapping() {
        let build = submit_error(HttpError::Status { status: 400, body: "no collateral".into() });
        assert_eq!(build, ChainError::BuildError("no collateral".into()));

        let funds = submit_error(HttpError::Status { status: 402, body: "need 2 ADA".into() });
        assert!(matches!(funds, ChainError::InsufficientFunds(_)));

        let other = submit_error(HttpError::RateLimited);
        assert!(matches!(other, ChainError::SubmitError(_)));
    }

    #[test]
    fn test_signed_request_body() {
        let swap = SwapTransaction {
            pool_id: "pool1".into(),
            sender: "addr_test1sender".into(),
            asset_in: "lovelace".into(),
            asset_out: "token".into(),
            amount_in: 10_000_000,
            min_amount_out: 9_900,
        };
        let request = SignedRequest {
            address: "addr_test1sender",
            network: Network::Preprod,
            mnemonic: "abandon ability",
            body: &swap,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["network"], "Preprod");
        assert_eq!(value["poolId"], "pool1");
        assert_eq!(value["minAmountOut"], 9_900);
    }

    #[tokio::test]
    async fn test_sender_mismatch_rejected_before_request() {
        let client = ChainGatewayClient::new().unwrap();
        let signer = SigningContext::new("addr_test1a".into(), Network::Preprod, "abandon".into());
        let transfer = TransferRequest {
            from: "addr_test1b".into(),
            to: "addr_test1c".into(),
            assets: vec![],
        };
        let result = client.submit_transfer(&signer, &transfer).await;
        assert!(matches!(result, Err(ChainError::InvalidParameters(_))));
    }
}
