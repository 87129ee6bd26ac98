use axum::{Json, extract::State};
use std::sync::Arc;

use crate::account::{AccountProfile, NewAccount};
use crate::gateway::state::AppState;
use crate::gateway::types::{
    ApiError, ApiResult, LoginRequest, LoginResponse, created, error_codes, ok,
};

/// Register a new account
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewAccount>,
) -> ApiResult<AccountProfile> {
    let account = state.bank.accounts().create_account(req).await?;
    created(account.profile())
}

/// Login and issue a JWT
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let account = state
        .bank
        .accounts()
        .validate_credentials(&req.email, &req.password)
        .await
        .ok_or_else(|| {
            tracing::info!("Login rejected");
            ApiError::unauthorized(error_codes::AUTH_FAILED, "Invalid email or password")
        })?;

    let token = state.jwt.issue(account.id).map_err(|e| {
        tracing::error!(error = %e, "Token signing failed");
        ApiError::new(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            "Login failed",
        )
    })?;

    tracing::info!(account_id = %account.id, "Login succeeded");
    ok(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.jwt.ttl().as_secs(),
        account: account.profile(),
    })
}
