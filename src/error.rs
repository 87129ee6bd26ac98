//! Ledger Error Types
//!
//! One taxonomy for every operation of the core. Lower layers have their own
//! error enums (`MoneyError`, `BalanceError`, `JournalError`) converted here.

use thiserror::Error;

use crate::balance::BalanceError;
use crate::journal::JournalError;
use crate::money::MoneyError;

/// Ledger error types
///
/// Error codes are stable strings for API responses and logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Validation Errors (rejected, no state change) ===
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Account is inactive: {0}")]
    AccountInactive(String),

    #[error("Cannot transfer to the same account")]
    SelfTransfer,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // === Ledger State Errors ===
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    // === External Provider Errors ===
    #[error("Payment provider not configured")]
    ProviderUnavailable,

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    // === System Errors ===
    #[error("Internal system error: {0}")]
    SystemError(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            LedgerError::AccountInactive(_) => "ACCOUNT_INACTIVE",
            LedgerError::SelfTransfer => "SELF_TRANSFER",
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            LedgerError::Validation(_) => "VALIDATION_FAILED",
            LedgerError::Forbidden(_) => "FORBIDDEN",
            LedgerError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            LedgerError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            LedgerError::DuplicateRequest(_) => "DUPLICATE_REQUEST",
            LedgerError::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            LedgerError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            LedgerError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::SelfTransfer
            | LedgerError::InvalidAmount(_)
            | LedgerError::Validation(_) => 400,
            LedgerError::PaymentDeclined(_) => 402,
            LedgerError::Forbidden(_) => 403,
            LedgerError::AccountNotFound(_) | LedgerError::TransactionNotFound(_) => 404,
            LedgerError::DuplicateAccount(_)
            | LedgerError::DuplicateRequest(_)
            | LedgerError::InvalidStateTransition(_) => 409,
            LedgerError::AccountInactive(_) | LedgerError::InsufficientFunds => 422,
            LedgerError::SystemError(_) => 500,
            LedgerError::ProviderUnavailable => 503,
        }
    }

    /// Rejected before any state change
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound(_)
                | LedgerError::AccountInactive(_)
                | LedgerError::SelfTransfer
                | LedgerError::InvalidAmount(_)
                | LedgerError::InsufficientFunds
                | LedgerError::Validation(_)
        )
    }
}

impl From<MoneyError> for LedgerError {
    fn from(e: MoneyError) -> Self {
        LedgerError::InvalidAmount(e.to_string())
    }
}

impl From<BalanceError> for LedgerError {
    fn from(e: BalanceError) -> Self {
        match e {
            BalanceError::Insufficient { .. } => LedgerError::InsufficientFunds,
            BalanceError::Overflow => LedgerError::SystemError(e.to_string()),
        }
    }
}

impl From<JournalError> for LedgerError {
    fn from(e: JournalError) -> Self {
        LedgerError::SystemError(e.to_string())
    }
}
