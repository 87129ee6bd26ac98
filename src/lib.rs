//! Bank Ledger - accounts, balances and peer-to-peer transfers
//!
//! An in-process ledger with a journaled, crash-recoverable core and an HTTP
//! gateway in front of it.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier types (AccountId, TransactionId)
//! - [`money`] - Exact two-decimal currency amounts
//! - [`balance`] - Enforced non-negative balance type
//! - [`account`] - Account store and credentials
//! - [`ledger`] - Append-only transaction ledger
//! - [`journal`] - Write-ahead journal, snapshots and recovery
//! - [`transfer`] - Transfer engine (internal transfers, deposits, withdrawals)
//! - [`query`] - Read-only history, summaries and admin statistics
//! - [`bank`] - Composition root
//! - [`gateway`] - HTTP API

// Core types - must be first!
pub mod core_types;

pub mod money;

pub mod account;
pub mod balance;
pub mod bank;
pub mod config;
pub mod error;
pub mod gateway;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod query;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountProfile, AccountStore, NewAccount};
pub use balance::Balance;
pub use bank::Bank;
pub use config::AppConfig;
pub use core_types::{AccountId, SeqNum, TransactionId};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{Transaction, TransactionKind, TransactionLedger, TransactionStatus};
pub use money::Amount;
pub use query::{AdminStats, HistoryEntry, QueryService, TransactionSummary};
pub use transfer::{ExternalRequest, OpResult, TransferEngine, TransferRequest};
