//! HTTP handlers grouped by audience

pub mod account;
pub mod admin;
pub mod auth;
pub mod health;
pub mod payments;

use crate::core_types::{AccountId, TransactionId};

use super::types::ApiError;

fn parse_account_id(raw: &str) -> Result<AccountId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid account id: {}", raw)))
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid transaction id: {}", raw)))
}
