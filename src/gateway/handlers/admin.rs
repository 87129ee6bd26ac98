use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::parse_account_id;
use crate::account::AccountProfile;
use crate::gateway::auth::AuthenticatedAccount;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResult, StatusRequest, ok};
use crate::query::{AdminStats, HistoryEntry};

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(requester)): Extension<AuthenticatedAccount>,
) -> ApiResult<Vec<AccountProfile>> {
    ok(state.bank.query().all_accounts(requester).await?)
}

/// GET /api/v1/admin/transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(requester)): Extension<AuthenticatedAccount>,
) -> ApiResult<Vec<HistoryEntry>> {
    ok(state.bank.query().all_transactions(requester).await?)
}

/// PATCH /api/v1/admin/users/{id}/status
pub async fn set_user_status(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(requester)): Extension<AuthenticatedAccount>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<AccountProfile> {
    let target = parse_account_id(&id)?;
    let profile = state
        .bank
        .set_account_active(requester, target, req.is_active)
        .await?;
    tracing::info!(admin = %requester, account_id = %target, is_active = req.is_active, "Admin changed account status");
    ok(profile)
}

/// GET /api/v1/admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(requester)): Extension<AuthenticatedAccount>,
) -> ApiResult<AdminStats> {
    ok(state.bank.query().admin_stats(requester).await?)
}
