//! HTTP Gateway
//!
//! axum router under `/api/v1`. Public routes: health, register, login.
//! Everything else sits behind [`auth::jwt_auth_middleware`]; admin routes
//! additionally look the caller up and require the admin flag.

pub mod auth;
pub mod handlers;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the complete router
pub fn build_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let private_routes = Router::new()
        .route("/me", get(handlers::account::me))
        .route("/transactions", get(handlers::account::transactions))
        .route("/transactions/summary", get(handlers::account::summary))
        .route("/payments", post(handlers::payments::create_payment))
        .route(
            "/payments/external/{id}/settle",
            post(handlers::payments::settle),
        )
        .route("/deposits", post(handlers::payments::deposit))
        .route("/withdrawals", post(handlers::payments::withdraw))
        .route("/admin/users", get(handlers::admin::list_users))
        .route(
            "/admin/users/{id}/status",
            patch(handlers::admin::set_user_status),
        )
        .route("/admin/transactions", get(handlers::admin::list_transactions))
        .route("/admin/stats", get(handlers::admin::stats))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    Router::new()
        .route("/api/v1/health", get(handlers::health::health_check))
        .nest("/api/v1/auth", auth_routes)
        .nest("/api/v1", private_routes)
        .with_state(state)
}

/// Start HTTP Gateway server. Returns after ctrl-c once in-flight requests
/// have finished.
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    tracing::info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
