//! Gateway types module
//!
//! ## Submodules
//! - [`dto`]: Request and response bodies
//! - [`response`]: Response envelope, error codes and error mapping

pub mod dto;
pub mod response;

pub use dto::{
    AmountInput, FundsRequest, LoginRequest, LoginResponse, PageQuery, PaymentRequest,
    SettleOutcome, SettleRequest, StatusRequest,
};
pub use response::{ApiError, ApiResponse, ApiResult, created, error_codes, ok};
