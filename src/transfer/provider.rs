//! Payment Provider Adapters
//!
//! External funds movement (deposits and withdrawals crossing into another
//! provider). Calls MUST be idempotent by transaction id: the same id may be
//! presented again after a crash.

use async_trait::async_trait;

use super::types::OpResult;
use crate::core_types::{AccountId, TransactionId};
use crate::money::Amount;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Get provider name for logging
    fn name(&self) -> &'static str;

    /// Pull funds from the account holder's external instrument (deposit)
    async fn collect(&self, tx_id: TransactionId, account_id: AccountId, amount: Amount)
    -> OpResult;

    /// Push funds to the account holder's external instrument (withdrawal)
    async fn payout(&self, tx_id: TransactionId, account_id: AccountId, amount: Amount) -> OpResult;
}

/// Provider that accepts everything immediately. For demos and local runs.
pub struct SandboxProvider;

#[async_trait]
impl PaymentProvider for SandboxProvider {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn collect(
        &self,
        tx_id: TransactionId,
        _account_id: AccountId,
        _amount: Amount,
    ) -> OpResult {
        OpResult::Success(format!("sbx_in_{}", tx_id))
    }

    async fn payout(
        &self,
        tx_id: TransactionId,
        _account_id: AccountId,
        _amount: Amount,
    ) -> OpResult {
        OpResult::Success(format!("sbx_out_{}", tx_id))
    }
}
