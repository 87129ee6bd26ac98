//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants
//! - `ApiError`: `LedgerError` rendered as an HTTP response

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::LedgerError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// 200 + envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_FUNDS: i32 = 1002;
    pub const INVALID_AMOUNT: i32 = 1003;
    pub const SELF_TRANSFER: i32 = 1004;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const ACCOUNT_INACTIVE: i32 = 2003;
    pub const FORBIDDEN: i32 = 2004;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const TRANSACTION_NOT_FOUND: i32 = 4002;
    pub const DUPLICATE_ACCOUNT: i32 = 4091;
    pub const DUPLICATE_REQUEST: i32 = 4092;
    pub const INVALID_STATE: i32 = 4093;
    pub const PAYMENT_DECLINED: i32 = 4021;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Error half of every handler result
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, msg)
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let code = match &e {
            LedgerError::AccountNotFound(_) => error_codes::ACCOUNT_NOT_FOUND,
            LedgerError::DuplicateAccount(_) => error_codes::DUPLICATE_ACCOUNT,
            LedgerError::AccountInactive(_) => error_codes::ACCOUNT_INACTIVE,
            LedgerError::SelfTransfer => error_codes::SELF_TRANSFER,
            LedgerError::InvalidAmount(_) => error_codes::INVALID_AMOUNT,
            LedgerError::InsufficientFunds => error_codes::INSUFFICIENT_FUNDS,
            LedgerError::Validation(_) => error_codes::INVALID_PARAMETER,
            LedgerError::Forbidden(_) => error_codes::FORBIDDEN,
            LedgerError::InvalidStateTransition(_) => error_codes::INVALID_STATE,
            LedgerError::TransactionNotFound(_) => error_codes::TRANSACTION_NOT_FOUND,
            LedgerError::DuplicateRequest(_) => error_codes::DUPLICATE_REQUEST,
            LedgerError::ProviderUnavailable => error_codes::SERVICE_UNAVAILABLE,
            LedgerError::PaymentDeclined(_) => error_codes::PAYMENT_DECLINED,
            LedgerError::SystemError(_) => error_codes::INTERNAL_ERROR,
        };
        let status = StatusCode::from_u16(e.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Internal details stay in the logs
        let msg = match &e {
            LedgerError::SystemError(detail) => {
                tracing::error!(error_code = e.code(), detail = %detail, "Request failed");
                "Internal system error".to_string()
            }
            _ => e.to_string(),
        };
        Self::new(status, code, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json, serde_json::json!({"code": 0, "msg": "ok", "data": 42}));
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::error(
            error_codes::AUTH_FAILED,
            "Invalid token",
        ))
        .unwrap();
        assert_eq!(json, serde_json::json!({"code": 2002, "msg": "Invalid token"}));
    }

    #[test]
    fn test_ledger_error_mapping() {
        let e = ApiError::from(LedgerError::InsufficientFunds);
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.code, error_codes::INSUFFICIENT_FUNDS);

        let e = ApiError::from(LedgerError::SelfTransfer);
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e = ApiError::from(LedgerError::SystemError("disk on fire".into()));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!e.msg.contains("disk"));
    }
}
