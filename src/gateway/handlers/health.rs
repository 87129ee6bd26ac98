//! Health check handler

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::gateway::state::AppState;
use crate::gateway::types::{ApiResult, ok};

/// Health check response data
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
    /// "file" or "memory"
    pub storage: &'static str,
    pub payment_provider: Option<&'static str>,
}

/// GET /api/v1/health
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let storage = if state.bank.is_durable() { "file" } else { "memory" };
    ok(HealthResponse {
        timestamp_ms: Utc::now().timestamp_millis(),
        storage,
        payment_provider: state.bank.engine().provider_name(),
    })
}
