use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::models::{SigningContext, SwapTransaction, TransferRequest};
use crate::domain::{Network, Utxo};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChainError {
    #[error("API request failed: {0}")]
    ApiError(String),
    #[error("Key derivation failed: {0}")]
    DerivationError(String),
    #[error("Transaction build failed: {0}")]
    BuildError(String),
    #[error("Transaction signing failed: {0}")]
    SigningError(String),
    #[error("Transaction submission failed: {0}")]
    SubmitError(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Chain query and wallet signing library
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainPort: Send + Sync {
    /// Fresh 24-word mnemonic
    async fn generate_mnemonic(&self) -> Result<String, ChainError>;

    /// Base payment address of the first account derived from `mnemonic`
    async fn derive_address(&self, mnemonic: &str, network: Network) -> Result<String, ChainError>;

    /// Unspent outputs currently at `address`
    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, ChainError>;

    /// Build, sign and submit a swap; returns the transaction id
    async fn submit_swap(
        &self,
        signer: &SigningContext,
        swap: &SwapTransaction,
    ) -> Result<String, ChainError>;

    /// Build, sign and submit a transfer; returns the transaction id
    async fn submit_transfer(
        &self,
        signer: &SigningContext,
        transfer: &TransferRequest,
    ) -> Result<String, ChainError>;
}
