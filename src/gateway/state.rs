use std::sync::Arc;

use super::auth::JwtAuth;
use crate::bank::Bank;

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    pub bank: Arc<Bank>,
    pub jwt: Arc<JwtAuth>,
}

impl AppState {
    pub fn new(bank: Arc<Bank>, jwt: JwtAuth) -> Self {
        Self {
            bank,
            jwt: Arc::new(jwt),
        }
    }
}
