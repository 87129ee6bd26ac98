//! Bearer-token authentication
//!
//! Login issues an HS256 JWT whose `sub` is the account id. The middleware
//! verifies it, checks the account still exists and is active, and injects
//! [`AuthenticatedAccount`] for the handlers.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::state::AppState;
use super::types::{ApiError, error_codes};
use crate::core_types::AccountId;
use crate::error::LedgerError;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Caller identity injected by [`jwt_auth_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedAccount(pub AccountId);

pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtAuth {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, account_id: AccountId) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
    }
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized(error_codes::MISSING_AUTH, "Missing Authorization header")
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized(error_codes::AUTH_FAILED, "Invalid token format"))?;

    // 2. Verify token
    let claims = state.jwt.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::unauthorized(error_codes::AUTH_FAILED, "Invalid or expired token")
    })?;
    let account_id: AccountId = claims
        .sub
        .parse()
        .map_err(|_| ApiError::unauthorized(error_codes::AUTH_FAILED, "Invalid account in token"))?;

    // 3. Account must still exist and be active
    let account = match state.bank.accounts().get_by_id(account_id).await {
        Ok(account) => account,
        Err(LedgerError::AccountNotFound(_)) => {
            return Err(ApiError::unauthorized(
                error_codes::AUTH_FAILED,
                "Account no longer exists",
            ));
        }
        Err(e) => return Err(e.into()),
    };
    if !account.is_active {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            error_codes::ACCOUNT_INACTIVE,
            "Account is inactive",
        ));
    }

    // 4. Inject identity
    request
        .extensions_mut()
        .insert(AuthenticatedAccount(account_id));
    Ok(next.run(request).await)
}
