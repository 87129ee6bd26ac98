use anyhow::{Context, bail};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::account::CredentialHasher;
use crate::error::LedgerResult;
use crate::money::{Amount, MoneyError};

/// Environment variable overriding `auth.jwt_secret`
pub const JWT_SECRET_ENV: &str = "BANK_JWT_SECRET";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// hourly | daily | never
    pub rotation: String,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "bank_ledger.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            ledger: LedgerConfig::default(),
            auth: AuthConfig::default(),
            payments: PaymentsConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Nothing survives a restart
    Memory,
    /// WAL + snapshots under `data_dir`
    File,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub data_dir: PathBuf,
    /// fsync every journal append
    pub sync_on_append: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Memory,
            data_dir: PathBuf::from("./data/ledger"),
            sync_on_append: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    /// Decimal string, e.g. "1000.00"
    pub starting_balance: String,
    pub lock_timeout_ms: u64,
    pub apply_timeout_ms: u64,
    /// Calendar used for daily statistics (0 = UTC)
    pub reference_utc_offset_minutes: i32,
    pub admin_emails: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: "1000.00".to_string(),
            lock_timeout_ms: 5_000,
            apply_timeout_ms: 5_000,
            reference_utc_offset_minutes: 0,
            admin_emails: Vec::new(),
        }
    }
}

impl LedgerConfig {
    pub fn starting_balance(&self) -> Result<Amount, MoneyError> {
        Amount::parse_balance(&self.starting_balance)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_millis(self.apply_timeout_ms)
    }

    pub fn reference_offset(&self) -> Option<FixedOffset> {
        self.reference_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    /// argon2id memory cost
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".to_string(),
            token_ttl_hours: 24,
            hash_memory_kib: 19_456,
            hash_iterations: 2,
        }
    }
}

impl AuthConfig {
    pub fn hasher(&self) -> LedgerResult<CredentialHasher> {
        CredentialHasher::new(self.hash_memory_kib, self.hash_iterations, 1)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 3600)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deposits and withdrawals are unavailable
    None,
    Sandbox,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PaymentsConfig {
    pub provider: ProviderKind,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::None,
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file: {}", config_path))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config yaml")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.ledger.starting_balance().with_context(|| {
            format!(
                "ledger.starting_balance {:?} is not a valid amount",
                self.ledger.starting_balance
            )
        })?;
        if self.ledger.reference_offset().is_none() {
            bail!(
                "ledger.reference_utc_offset_minutes {} is out of range",
                self.ledger.reference_utc_offset_minutes
            );
        }
        if self.ledger.lock_timeout_ms == 0 || self.ledger.apply_timeout_ms == 0 {
            bail!("ledger timeouts must be positive");
        }
        if self.auth.jwt_secret.is_empty() {
            bail!("auth.jwt_secret must not be empty (set {})", JWT_SECRET_ENV);
        }
        if self.auth.token_ttl_hours == 0 {
            bail!("auth.token_ttl_hours must be positive");
        }
        self.auth.hasher().context("invalid auth hashing parameters")?;
        Ok(())
    }
}
