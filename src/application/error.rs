use thiserror::Error;

use crate::custody::CustodyError;
use crate::domain::{OrderError, WalletInputError};
use crate::ports::{ChainError, OracleError, StoreError};

/// Errors surfaced by engine operations.
///
/// `Validation` and `Unauthorized` are always raised before any state is
/// touched.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Price oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Custody error: {0}")]
    Custody(CustodyError),
}

impl From<OrderError> for EngineError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Invalid(msg) => EngineError::Validation(msg),
            other => EngineError::InvalidState(other.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::Duplicate(id) => EngineError::InvalidState(format!("{} already exists", id)),
            StoreError::Order(order) => order.into(),
            other => EngineError::Store(other),
        }
    }
}

impl From<CustodyError> for EngineError {
    fn from(e: CustodyError) -> Self {
        match e {
            CustodyError::InvalidInput(input) => EngineError::Validation(input.to_string()),
            CustodyError::NotFound(address) => EngineError::NotFound(format!("wallet {}", address)),
            CustodyError::AlreadyExists(address) => {
                EngineError::InvalidState(format!("wallet {} already exists", address))
            }
            other => EngineError::Custody(other),
        }
    }
}

impl From<WalletInputError> for EngineError {
    fn from(e: WalletInputError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl EngineError {
    /// Caller mistakes, as opposed to failures of a collaborator
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::Unauthorized(_)
                | EngineError::NotFound(_)
                | EngineError::InvalidState(_)
        )
    }
}
