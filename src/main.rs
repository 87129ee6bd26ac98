//! bank_ledger server
//!
//! ```text
//! config/<env>.yaml ─▶ logging ─▶ Bank::open (recover) ─▶ gateway
//! ```

use anyhow::Context;
use std::sync::Arc;

use bank_ledger::AppConfig;
use bank_ledger::bank::Bank;
use bank_ledger::gateway::{self, auth::JwtAuth, state::AppState};
use bank_ledger::logging::init_logging;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _guard = init_logging(&config);

    tracing::info!(env = %env, storage = ?config.storage.mode, "Starting bank_ledger");

    let bank = Arc::new(Bank::open(&config).await.context("Failed to open ledger")?);
    let jwt = JwtAuth::new(&config.auth.jwt_secret, config.auth.token_ttl());
    let state = Arc::new(AppState::new(bank.clone(), jwt));

    gateway::run_server(&config.gateway, state).await?;

    // No request is in flight after graceful shutdown
    bank.checkpoint().await.context("Final checkpoint failed")?;
    tracing::info!("Shutdown complete");
    Ok(())
}
