//! Ledger recovery
//!
//! Handles cold/hot start from Snapshot + WAL.

use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use super::snapshot::{LedgerSnapshotter, LedgerState};
use super::wal::WalReader;
use super::{JournalError, JournalRecord};
use crate::account::Account;
use crate::core_types::{AccountId, SeqNum, TransactionId};
use crate::ledger::{Transaction, TransactionKind, TransactionStatus};

/// Reason recorded on transfers that never reached their commit record
pub const INTERRUPTED_REASON: &str = "SYSTEM_ERROR: interrupted before commit";

// ============================================================
// Recovery State
// ============================================================

#[derive(Debug, Default)]
pub struct RecoveredState {
    pub state: LedgerState,
    /// Sequence for the next journal entry
    pub next_seq: SeqNum,
    /// Entries applied from the WAL (0 = snapshot only or cold start)
    pub replayed: usize,
    /// Pending transfers closed as failed during recovery
    pub interrupted: Vec<TransactionId>,
}

#[derive(Default)]
struct ReplayState {
    accounts: FxHashMap<AccountId, Account>,
    transactions: Vec<Transaction>,
    tx_index: FxHashMap<TransactionId, usize>,
}

impl ReplayState {
    fn from_snapshot(state: LedgerState) -> Self {
        let mut replay = ReplayState::default();
        for account in state.accounts {
            replay.accounts.insert(account.id, account);
        }
        for tx in state.transactions {
            replay.push_transaction(tx);
        }
        replay
    }

    fn push_transaction(&mut self, tx: Transaction) {
        self.tx_index.insert(tx.id, self.transactions.len());
        self.transactions.push(tx);
    }

    fn transaction_mut(&mut self, id: TransactionId) -> Option<&mut Transaction> {
        let idx = *self.tx_index.get(&id)?;
        self.transactions.get_mut(idx)
    }

    fn apply(&mut self, seq: SeqNum, record: JournalRecord) {
        match record {
            JournalRecord::AccountCreated(account) => {
                self.accounts.insert(account.id, account);
            }
            JournalRecord::AccountStatusChanged {
                account_id,
                is_active,
            } => match self.accounts.get_mut(&account_id) {
                Some(account) => account.is_active = is_active,
                None => tracing::warn!(seq, %account_id, "Status change for unknown account"),
            },
            JournalRecord::BalanceAdjusted(entry) => self.set_balance(seq, entry),
            JournalRecord::TransactionAppended(tx) => self.push_transaction(tx),
            JournalRecord::TransactionStatusChanged {
                transaction_id,
                status,
                failure_reason,
                external_reference,
            } => self.set_status(seq, transaction_id, status, failure_reason, external_reference),
            JournalRecord::FundsMoved {
                transaction_id,
                status,
                failure_reason,
                external_reference,
                balances,
            } => {
                // A commit write that landed after its compensation
                let compensated = self
                    .tx_index
                    .get(&transaction_id)
                    .and_then(|idx| self.transactions.get(*idx))
                    .is_some_and(|tx| tx.status == TransactionStatus::Failed);
                if compensated && status != TransactionStatus::Failed {
                    tracing::warn!(seq, %transaction_id, "Skipping funds move for failed transaction");
                    return;
                }
                for entry in balances {
                    self.set_balance(seq, entry);
                }
                if status.is_terminal() {
                    self.set_status(seq, transaction_id, status, failure_reason, external_reference);
                }
            }
        }
    }

    fn set_balance(&mut self, seq: SeqNum, entry: super::BalanceEntry) {
        match self.accounts.get_mut(&entry.account_id) {
            Some(account) => account.set_balance(entry.balance),
            None => tracing::warn!(seq, account_id = %entry.account_id, "Balance for unknown account"),
        }
    }

    fn set_status(
        &mut self,
        seq: SeqNum,
        id: TransactionId,
        status: TransactionStatus,
        failure_reason: Option<String>,
        external_reference: Option<String>,
    ) {
        match self.transaction_mut(id) {
            Some(tx) => {
                tx.status = status;
                if failure_reason.is_some() {
                    tx.failure_reason = failure_reason;
                }
                if external_reference.is_some() {
                    tx.external_reference = external_reference;
                }
            }
            None => tracing::warn!(seq, transaction_id = %id, "Status for unknown transaction"),
        }
    }

    /// Internal transfers hold both locks until their commit record is
    /// written, so a pending transfer after replay never committed.
    fn close_interrupted(&mut self) -> Vec<TransactionId> {
        let mut closed = Vec::new();
        for tx in &mut self.transactions {
            if tx.kind == TransactionKind::Transfer && tx.status == TransactionStatus::Pending {
                tx.status = TransactionStatus::Failed;
                tx.failure_reason = Some(INTERRUPTED_REASON.to_string());
                closed.push(tx.id);
            }
        }
        closed
    }

    fn into_state(self) -> LedgerState {
        let mut accounts: Vec<Account> = self.accounts.into_values().collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        LedgerState {
            accounts,
            transactions: self.transactions,
        }
    }
}

// ============================================================
// Ledger Recovery
// ============================================================

/// Layout under `data_dir`: `snapshots/` and `wal/current.wal`
pub struct LedgerRecovery {
    data_dir: PathBuf,
}

impl LedgerRecovery {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("wal").join("current.wal")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    pub fn snapshotter(&self) -> LedgerSnapshotter {
        LedgerSnapshotter::new(self.snapshot_dir())
    }

    /// Recover state from Snapshot + WAL
    ///
    /// Recovery flow:
    /// 1. Load latest snapshot, or cold start with empty state (seq 0)
    /// 2. Replay WAL entries with seq > snapshot seq
    /// 3. Stop at the first torn or corrupt entry (crash tail)
    /// 4. Close transfers that never committed
    pub fn recover(&self) -> Result<RecoveredState, JournalError> {
        let (mut replay, snapshot_seq) = match self.snapshotter().load_latest_snapshot()? {
            Some((metadata, state)) => {
                tracing::info!(
                    seq_id = metadata.wal_seq_id,
                    accounts = metadata.account_count,
                    transactions = metadata.transaction_count,
                    "Loaded snapshot"
                );
                (ReplayState::from_snapshot(state), metadata.wal_seq_id)
            }
            None => {
                tracing::info!("No snapshot found, cold start");
                (ReplayState::default(), 0)
            }
        };

        let mut last_seq = snapshot_seq;
        let mut replayed = 0usize;

        let wal_path = self.wal_path();
        if wal_path.exists() {
            let mut reader = WalReader::new(BufReader::new(File::open(&wal_path)?));
            loop {
                let entry = match reader.read_entry() {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e)
                        if matches!(
                            e.kind(),
                            io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
                        ) =>
                    {
                        tracing::warn!(error = %e, last_seq, "WAL tail is torn or corrupt, stopping replay");
                        break;
                    }
                    Err(e) => return Err(e.into()),
                };

                let seq = entry.header.seq_id;
                if seq <= snapshot_seq {
                    continue;
                }
                let record: JournalRecord = match bincode::deserialize(&entry.payload) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(seq, error = %e, "Undecodable WAL payload, stopping replay");
                        break;
                    }
                };
                replay.apply(seq, record);
                last_seq = seq;
                replayed += 1;
            }
        }

        let interrupted = replay.close_interrupted();
        for id in &interrupted {
            tracing::warn!(transaction_id = %id, "Transfer interrupted before commit, marked failed");
        }

        tracing::info!(replayed, last_seq, "Recovery complete");

        Ok(RecoveredState {
            state: replay.into_state(),
            next_seq: last_seq + 1,
            replayed,
            interrupted,
        })
    }
}
