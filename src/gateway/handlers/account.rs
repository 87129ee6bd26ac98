use axum::{
    Extension,
    extract::{Query, State},
};
use std::sync::Arc;

use crate::account::AccountProfile;
use crate::gateway::auth::AuthenticatedAccount;
use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResult, PageQuery, ok};
use crate::query::{HistoryEntry, TransactionSummary};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

/// GET /api/v1/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account_id)): Extension<AuthenticatedAccount>,
) -> ApiResult<AccountProfile> {
    let account = state.bank.accounts().get_by_id(account_id).await?;
    ok(account.profile())
}

/// Newest first. Unpaged unless `offset` or `limit` is given.
///
/// GET /api/v1/transactions
pub async fn transactions(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account_id)): Extension<AuthenticatedAccount>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<HistoryEntry>> {
    let query = state.bank.query();
    let entries = if page.offset.is_none() && page.limit.is_none() {
        query.history(account_id).await?
    } else {
        let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
        query
            .history_page(account_id, page.offset.unwrap_or(0), limit)
            .await?
    };
    ok(entries)
}

/// GET /api/v1/transactions/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedAccount(account_id)): Extension<AuthenticatedAccount>,
) -> ApiResult<TransactionSummary> {
    ok(state.bank.query().summary(account_id).await?)
}
