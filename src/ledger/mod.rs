//! Transaction Ledger
//!
//! Append-only record of money movements. Entries start `pending` or directly
//! terminal; the only allowed transition is `pending -> completed|failed`.

pub mod models;
pub mod store;

pub use models::{NewTransaction, Transaction, TransactionKind, TransactionStatus};
pub use store::TransactionLedger;
