use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

use super::parse_transaction_id;
use crate::gateway::auth::AuthenticatedAccount;
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiError, ApiResponse, ApiResult, FundsRequest, PaymentRequest, SettleRequest, ok,
};
use crate::ledger::{Transaction, TransactionStatus};
use crate::transfer::{ExternalRequest, TransferRequest};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| ApiError::bad_request("Idempotency-Key must be ASCII"))?
        .trim();
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ApiError::bad_request(format!(
            "Idempotency-Key must be 1-{} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    Ok(Some(key.to_string()))
}

/// 201 when the transaction settled, 202 while the provider is still working
fn settled_or_accepted(tx: Transaction) -> ApiResult<Transaction> {
    let status = match tx.status {
        TransactionStatus::Pending => StatusCode::ACCEPTED,
        _ => StatusCode::CREATED,
    };
    Ok((status, Json(ApiResponse::success(tx))))
}

/// Send money to another account by email
///
/// POST /api/v1/payments
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(sender_id)): Extension<AuthenticatedAccount>,
    headers: HeaderMap,
    Json(req): Json<PaymentRequest>,
) -> ApiResult<Transaction> {
    let amount = req.amount.parse()?;
    let mut transfer = TransferRequest::new(sender_id, req.recipient_email, amount);
    if let Some(description) = req.description {
        transfer = transfer.with_description(description);
    }
    if let Some(key) = idempotency_key(&headers)? {
        transfer = transfer.with_idempotency_key(key);
    }
    let tx = state.bank.engine().transfer(transfer).await?;
    settled_or_accepted(tx)
}

fn external_request(
    account_id: crate::core_types::AccountId,
    req: FundsRequest,
) -> Result<ExternalRequest, ApiError> {
    let mut external = ExternalRequest::new(account_id, req.amount.parse()?);
    if let Some(description) = req.description {
        external = external.with_description(description);
    }
    Ok(external)
}

/// POST /api/v1/deposits
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account_id)): Extension<AuthenticatedAccount>,
    Json(req): Json<FundsRequest>,
) -> ApiResult<Transaction> {
    let tx = state
        .bank
        .engine()
        .deposit(external_request(account_id, req)?)
        .await?;
    settled_or_accepted(tx)
}

/// POST /api/v1/withdrawals
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account_id)): Extension<AuthenticatedAccount>,
    Json(req): Json<FundsRequest>,
) -> ApiResult<Transaction> {
    let tx = state
        .bank
        .engine()
        .withdraw(external_request(account_id, req)?)
        .await?;
    settled_or_accepted(tx)
}

/// Provider callback for a pending deposit or withdrawal (admin only)
///
/// POST /api/v1/payments/external/{id}/settle
pub async fn settle(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(requester)): Extension<AuthenticatedAccount>,
    Path(id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> ApiResult<Transaction> {
    state.bank.query().require_admin(requester).await?;
    let tx_id = parse_transaction_id(&id)?;
    let tx = state
        .bank
        .engine()
        .settle_external(tx_id, req.into_op_result())
        .await?;
    ok(tx)
}
