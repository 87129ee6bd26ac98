//! Durable state changes
//!
//! Every mutation of the account store or the ledger is written to a
//! [`Journal`] before it becomes visible in memory. The file-backed journal is
//! a CRC-checked binary write-ahead log plus periodic atomic snapshots; the
//! memory journal only sequences records.
//!
//! # Replay Rules
//! - Balance values in records are absolute, so replay is order-based and
//!   never re-derives arithmetic.
//! - A transfer's debit, credit and completed status are one
//!   [`JournalRecord::FundsMoved`] record: the commit point.

pub mod file;
pub mod memory;
pub mod recovery;
pub mod snapshot;
pub mod wal;

pub use file::FileJournal;
pub use memory::MemoryJournal;
pub use recovery::{LedgerRecovery, RecoveredState};
pub use snapshot::{LedgerSnapshotter, LedgerState, SnapshotMetadata};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::account::Account;
use crate::balance::Balance;
use crate::core_types::{AccountId, SeqNum, TransactionId};
use crate::ledger::{Transaction, TransactionStatus};
use wal::WalEntryType;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Journal I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal encoding error: {0}")]
    Encode(String),

    #[error("Journal unavailable: {0}")]
    Unavailable(String),
}

impl From<bincode::Error> for JournalError {
    fn from(e: bincode::Error) -> Self {
        JournalError::Encode(e.to_string())
    }
}

/// Absolute balance of one account after a record is applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    pub account_id: AccountId,
    pub balance: Balance,
}

impl BalanceEntry {
    pub fn new(account_id: AccountId, balance: Balance) -> Self {
        Self {
            account_id,
            balance,
        }
    }
}

/// One durable state change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JournalRecord {
    AccountCreated(Account),
    AccountStatusChanged {
        account_id: AccountId,
        is_active: bool,
    },
    BalanceAdjusted(BalanceEntry),
    TransactionAppended(Transaction),
    TransactionStatusChanged {
        transaction_id: TransactionId,
        status: TransactionStatus,
        failure_reason: Option<String>,
        external_reference: Option<String>,
    },
    /// Balances moved for a transaction. `status` is the transaction's status
    /// after this record: `Completed` commits, `Failed` records a
    /// compensation, `Pending` reserves funds for an external payout.
    FundsMoved {
        transaction_id: TransactionId,
        status: TransactionStatus,
        failure_reason: Option<String>,
        external_reference: Option<String>,
        balances: Vec<BalanceEntry>,
    },
}

impl JournalRecord {
    pub fn entry_type(&self) -> WalEntryType {
        match self {
            JournalRecord::AccountCreated(_) => WalEntryType::AccountCreated,
            JournalRecord::AccountStatusChanged { .. } => WalEntryType::AccountStatus,
            JournalRecord::BalanceAdjusted(_) => WalEntryType::BalanceAdjusted,
            JournalRecord::TransactionAppended(_) => WalEntryType::TransactionAppended,
            JournalRecord::TransactionStatusChanged { .. } => WalEntryType::TransactionStatus,
            JournalRecord::FundsMoved { .. } => WalEntryType::FundsMoved,
        }
    }
}

/// Persistence seam for the account store, ledger and transfer engine.
///
/// `append` returns once the record is durable (per the journal's sync
/// policy) and yields its sequence number. An error means the record may or
/// may not have been written; callers treat it as a system failure.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Journal name for logging
    fn name(&self) -> &'static str;

    async fn append(&self, record: &JournalRecord) -> Result<SeqNum, JournalError>;
}
