//! Composition root
//!
//! Opens persistence, recovers state and wires the account store, ledger,
//! transfer engine and query service around one shared journal.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::account::{AccountProfile, AccountSettings, AccountStore};
use crate::config::{AppConfig, ProviderKind, StorageMode};
use crate::core_types::{AccountId, SeqNum};
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{
    FileJournal, Journal, LedgerRecovery, LedgerSnapshotter, LedgerState, MemoryJournal,
};
use crate::ledger::TransactionLedger;
use crate::query::QueryService;
use crate::transfer::{EngineConfig, PaymentProvider, SandboxProvider, TransferEngine};

struct FileStorage {
    journal: Arc<FileJournal>,
    snapshot_dir: PathBuf,
}

pub struct Bank {
    accounts: Arc<AccountStore>,
    ledger: Arc<TransactionLedger>,
    engine: Arc<TransferEngine>,
    query: Arc<QueryService>,
    storage: Option<FileStorage>,
}

impl Bank {
    /// Open with the provider named in `payments.provider`
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let provider: Option<Arc<dyn PaymentProvider>> = match config.payments.provider {
            ProviderKind::None => None,
            ProviderKind::Sandbox => Some(Arc::new(SandboxProvider)),
        };
        Self::open_with_provider(config, provider).await
    }

    pub async fn open_with_provider(
        config: &AppConfig,
        provider: Option<Arc<dyn PaymentProvider>>,
    ) -> anyhow::Result<Self> {
        let settings = AccountSettings {
            starting_balance: config
                .ledger
                .starting_balance()
                .context("invalid ledger.starting_balance")?,
            admin_emails: config.ledger.admin_emails.clone(),
            hasher: config.auth.hasher().context("invalid auth hashing parameters")?,
        };
        let reference_offset = config
            .ledger
            .reference_offset()
            .context("invalid ledger.reference_utc_offset_minutes")?;
        let engine_config = EngineConfig {
            lock_timeout: config.ledger.lock_timeout(),
            apply_timeout: config.ledger.apply_timeout(),
        };

        let (journal, state, storage): (Arc<dyn Journal>, LedgerState, Option<FileStorage>) =
            match config.storage.mode {
                StorageMode::Memory => {
                    tracing::warn!("Storage mode is memory: state is lost on restart");
                    (Arc::new(MemoryJournal::new()), LedgerState::default(), None)
                }
                StorageMode::File => {
                    let (journal, state, snapshot_dir) = open_file_storage(config).await?;
                    let storage = FileStorage {
                        journal: journal.clone(),
                        snapshot_dir,
                    };
                    (journal, state, Some(storage))
                }
            };

        tracing::info!(
            accounts = state.accounts.len(),
            transactions = state.transactions.len(),
            mode = ?config.storage.mode,
            "Ledger state loaded"
        );

        let accounts = Arc::new(AccountStore::with_accounts(
            journal.clone(),
            settings,
            state.accounts,
        ));
        let ledger = Arc::new(TransactionLedger::with_transactions(
            journal.clone(),
            state.transactions,
        ));
        let mut engine =
            TransferEngine::new(accounts.clone(), ledger.clone(), journal, engine_config);
        match provider {
            Some(provider) => engine = engine.with_provider(provider),
            None => tracing::info!("No payment provider configured, deposits and withdrawals disabled"),
        }
        let query = Arc::new(QueryService::new(
            accounts.clone(),
            ledger.clone(),
            reference_offset,
        ));

        Ok(Self {
            accounts,
            ledger,
            engine: Arc::new(engine),
            query,
            storage,
        })
    }

    pub fn accounts(&self) -> &Arc<AccountStore> {
        &self.accounts
    }

    pub fn ledger(&self) -> &Arc<TransactionLedger> {
        &self.ledger
    }

    pub fn engine(&self) -> &Arc<TransferEngine> {
        &self.engine
    }

    pub fn query(&self) -> &Arc<QueryService> {
        &self.query
    }

    pub fn is_durable(&self) -> bool {
        self.storage.is_some()
    }

    /// Admin status toggle
    pub async fn set_account_active(
        &self,
        requester: AccountId,
        target: AccountId,
        is_active: bool,
    ) -> LedgerResult<AccountProfile> {
        self.query.require_admin(requester).await?;
        if requester == target && !is_active {
            return Err(LedgerError::Validation(
                "administrators cannot deactivate themselves".into(),
            ));
        }
        let account = self.accounts.set_active(target, is_active).await?;
        Ok(account.profile())
    }

    /// Snapshot the full state and truncate the journal. Call only when no
    /// operation is in flight (startup, after graceful shutdown).
    pub async fn checkpoint(&self) -> anyhow::Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let state = LedgerState {
            accounts: self.accounts.list_all().await,
            transactions: self.ledger.export().await,
        };
        let next_seq = storage.journal.next_seq()?;
        write_checkpoint(&storage.snapshot_dir, &storage.journal, state, next_seq).await
    }
}

async fn write_checkpoint(
    snapshot_dir: &Path,
    journal: &FileJournal,
    state: LedgerState,
    next_seq: SeqNum,
) -> anyhow::Result<()> {
    let covered = next_seq.saturating_sub(1);
    let dir = snapshot_dir.to_path_buf();
    tokio::task::spawn_blocking(move || LedgerSnapshotter::new(dir).create_snapshot(&state, covered))
        .await
        .context("snapshot task failed")?
        .context("failed to write snapshot")?;
    journal.reset(next_seq).context("failed to truncate WAL")?;
    Ok(())
}

async fn open_file_storage(
    config: &AppConfig,
) -> anyhow::Result<(Arc<FileJournal>, LedgerState, PathBuf)> {
    let data_dir = config.storage.data_dir.clone();
    let recovered = tokio::task::spawn_blocking(move || LedgerRecovery::new(data_dir).recover())
        .await
        .context("recovery task failed")?
        .with_context(|| {
            format!(
                "failed to recover ledger from {}",
                config.storage.data_dir.display()
            )
        })?;

    if !recovered.interrupted.is_empty() {
        tracing::warn!(
            count = recovered.interrupted.len(),
            "Closed interrupted transfers during recovery"
        );
    }

    let recovery = LedgerRecovery::new(&config.storage.data_dir);
    let snapshot_dir = recovery.snapshot_dir();
    let journal = Arc::new(
        FileJournal::open(
            recovery.wal_path(),
            recovered.next_seq,
            config.storage.sync_on_append,
        )
        .context("failed to open WAL")?,
    );

    // Fold the replayed tail (and recovery decisions) into a fresh snapshot.
    // Truncating the WAL also drops any torn tail left by a crash.
    write_checkpoint(
        &snapshot_dir,
        &journal,
        recovered.state.clone(),
        recovered.next_seq,
    )
    .await?;

    Ok((journal, recovered.state, snapshot_dir))
}
