//! Transfer Core Types

use crate::core_types::AccountId;
use crate::money::Amount;

/// Internal transfer request from the API layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Authenticated sender
    pub sender_id: AccountId,
    /// Recipient lookup key (case-insensitive)
    pub recipient_email: String,
    pub amount: Amount,
    /// Defaults to "Payment to <recipient full name>"
    pub description: Option<String>,
    /// Client-provided idempotency key, scoped to the sender
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    pub fn new(sender_id: AccountId, recipient_email: impl Into<String>, amount: Amount) -> Self {
        Self {
            sender_id,
            recipient_email: recipient_email.into(),
            amount,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Deposit into or withdrawal out of the ledger through the payment provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRequest {
    pub account_id: AccountId,
    pub amount: Amount,
    pub description: Option<String>,
}

impl ExternalRequest {
    pub fn new(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Operation result from the payment provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// Funds moved; carries the provider's reference
    Success(String),
    /// Provider declined (nothing moved on its side)
    Failed(String),
    /// Outcome reported later through `settle_external`
    Pending,
}

impl OpResult {
    /// Check if this is a success result
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, OpResult::Success(_))
    }

    /// Check if this is an explicit failure (safe to compensate)
    #[inline]
    pub fn is_explicit_fail(&self) -> bool {
        matches!(self, OpResult::Failed(_))
    }

    /// Check if state is unknown (NOT safe to compensate)
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, OpResult::Pending)
    }
}
