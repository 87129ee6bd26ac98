//! Transaction records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{AccountId, TransactionId};
use crate::money::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Between two ledger accounts
    Transfer,
    /// Out of the ledger to an external sink
    Withdrawal,
    /// Into the ledger from an external source
    Deposit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Deposit => "deposit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal states: `Completed`, `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored ledger entry.
///
/// `from == None` is an external deposit source, `to == None` an external
/// withdrawal sink. Never serialized with skipped fields: the same type is
/// written to the binary journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub idempotency_key: Option<String>,
    pub external_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.from_account_id == Some(account_id) || self.to_account_id == Some(account_id)
    }
}

/// Input to [`super::TransactionLedger::append`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

impl NewTransaction {
    pub fn transfer(from: AccountId, to: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id: Some(from),
            to_account_id: Some(to),
            amount,
            kind: TransactionKind::Transfer,
            status: TransactionStatus::Pending,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn deposit(to: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id: None,
            to_account_id: Some(to),
            amount,
            kind: TransactionKind::Deposit,
            status: TransactionStatus::Pending,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn withdrawal(from: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id: Some(from),
            to_account_id: None,
            amount,
            kind: TransactionKind::Withdrawal,
            status: TransactionStatus::Pending,
            description: None,
            idempotency_key: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn into_transaction(self) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: self.amount,
            kind: self.kind,
            status: self.status,
            description: self.description,
            failure_reason: None,
            idempotency_key: self.idempotency_key,
            external_reference: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }

    #[test]
    fn test_json_shape() {
        let a = AccountId::new();
        let b = AccountId::new();
        let tx = NewTransaction::transfer(a, b, Amount::from_cents(25_000))
            .with_description(Some("rent".into()))
            .into_transaction();
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["amount"], "250.00");
        assert_eq!(json["kind"], "transfer");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["description"], "rent");
        assert!(tx.involves(a) && tx.involves(b));
    }

    #[test]
    fn test_binary_roundtrip() {
        let tx = NewTransaction::deposit(AccountId::new(), Amount::from_cents(1))
            .into_transaction();
        let bytes = bincode::serialize(&tx).unwrap();
        let back: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, tx);
    }
}
