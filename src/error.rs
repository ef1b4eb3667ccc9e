//! Error types for each layer of the service.
//!
//! Account errors are client-input failures and are never retried. Store
//! errors describe persistence failures; `Backend` passes the driver error
//! through untouched.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("invalid amount")]
    InvalidAmount,

    #[error("withdraw limit of {limit} exceeded")]
    WithdrawLimitExceeded { limit: Decimal },

    #[error("insufficient funds: balance is {balance}")]
    InsufficientFunds { balance: Decimal },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("client {0} not found")]
    NotFound(Uuid),

    /// The record changed since it was read, or the id is already taken.
    #[error("client {0} was modified concurrently")]
    Conflict(Uuid),

    #[error("expected a {expected} client, got {found}")]
    VariantMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown client type: {0}")]
    UnknownClientType(String),

    #[error("transaction history serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
