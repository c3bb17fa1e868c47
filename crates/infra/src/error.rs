//! Service-level errors for stock mutation and ledger rebuilds.

use thiserror::Error;

use stockledger_auth::AuthzError;
use stockledger_core::DomainError;

use crate::notices;
use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// The target stock row or product does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A store read or write failed; the transaction was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    /// The caller lacks the permission the operation requires.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Input rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl StockError {
    /// Notice code shown to the user for this failure.
    pub fn notice_code(&self) -> &'static str {
        match self {
            StockError::NotFound(_) => notices::RECORD_NOT_FOUND,
            StockError::Persistence(_) => notices::RECORD_SAVE_ERROR,
            StockError::Forbidden(_) => notices::NOT_ALLOWED_MODIFY,
            StockError::Validation(_) => notices::INVALID_VALUE,
        }
    }
}

impl From<DomainError> for StockError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StockError::Validation(msg),
            // Broken history (e.g. an orphaned count line) cannot be saved as a ledger.
            DomainError::InvariantViolation(msg) => StockError::Persistence(StoreError::Backend(msg)),
        }
    }
}

impl From<AuthzError> for StockError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(msg) => StockError::Forbidden(msg),
        }
    }
}
