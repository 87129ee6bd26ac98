//! Transfer Engine
//!
//! Internal transfers run entirely under both account locks and commit with
//! one `FundsMoved` journal record. External deposits and withdrawals go
//! through the optional [`PaymentProvider`]; no lock is held while the
//! provider is called.

use std::sync::Arc;
use std::time::Duration;

use super::locks::{AccountGuard, lock_one, lock_pair};
use super::provider::PaymentProvider;
use super::state::TransferState;
use super::types::{ExternalRequest, OpResult, TransferRequest};
use crate::account::{Account, AccountStore, BalanceChange};
use crate::balance::Balance;
use crate::core_types::{AccountId, TransactionId};
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{BalanceEntry, Journal, JournalRecord};
use crate::ledger::{
    NewTransaction, Transaction, TransactionKind, TransactionLedger, TransactionStatus,
};
use crate::money::Amount;

/// Engine timing limits
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Upper bound for acquiring account locks
    pub lock_timeout: Duration,
    /// Upper bound for the commit record write
    pub apply_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            apply_timeout: Duration::from_secs(5),
        }
    }
}

/// Collapse any failure after the pending append into `SystemError`
fn into_system(e: LedgerError) -> LedgerError {
    match e {
        LedgerError::SystemError(_) => e,
        other => LedgerError::SystemError(other.to_string()),
    }
}

fn failure_reason(e: &LedgerError) -> String {
    match e {
        LedgerError::SystemError(msg) => format!("SYSTEM_ERROR: {}", msg),
        other => format!("SYSTEM_ERROR: {}", other),
    }
}

fn check_parties(sender: &Account, recipient: &Account) -> LedgerResult<()> {
    if sender.id == recipient.id {
        return Err(LedgerError::SelfTransfer);
    }
    for account in [sender, recipient] {
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account.email.clone()));
        }
    }
    Ok(())
}

fn require_positive(amount: Amount) -> LedgerResult<()> {
    if amount.is_zero() {
        return Err(LedgerError::InvalidAmount("amount must be positive".into()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct TransferEngine {
    accounts: Arc<AccountStore>,
    ledger: Arc<TransactionLedger>,
    journal: Arc<dyn Journal>,
    provider: Option<Arc<dyn PaymentProvider>>,
    config: EngineConfig,
}

impl TransferEngine {
    pub fn new(
        accounts: Arc<AccountStore>,
        ledger: Arc<TransactionLedger>,
        journal: Arc<dyn Journal>,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts,
            ledger,
            journal,
            provider: None,
            config,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        tracing::info!(provider = provider.name(), "Payment provider configured");
        self.provider = Some(provider);
        self
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.name())
    }

    fn provider(&self) -> LedgerResult<Arc<dyn PaymentProvider>> {
        self.provider
            .clone()
            .ok_or(LedgerError::ProviderUnavailable)
    }

    /// Write a commit record bounded by `apply_timeout`
    async fn write_commit(&self, record: &JournalRecord) -> LedgerResult<()> {
        match tokio::time::timeout(self.config.apply_timeout, self.journal.append(record)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(LedgerError::SystemError(format!(
                "commit write timed out after {}ms",
                self.config.apply_timeout.as_millis()
            ))),
        }
    }

    /// Durably close `tx_id` as failed with `balances` as the restored state.
    /// Best effort: a lost compensation record is logged, the pending entry is
    /// closed by recovery.
    async fn compensate(&self, tx_id: TransactionId, reason: &str, balances: Vec<BalanceEntry>) {
        let record = JournalRecord::FundsMoved {
            transaction_id: tx_id,
            status: TransactionStatus::Failed,
            failure_reason: Some(reason.to_string()),
            external_reference: None,
            balances,
        };
        if let Err(e) = self.journal.append(&record).await {
            tracing::error!(transaction_id = %tx_id, error = %e, "Failed to journal compensation");
        }
        if let Err(e) = self
            .ledger
            .record_transition(tx_id, TransactionStatus::Failed, Some(reason.to_string()), None)
            .await
        {
            tracing::error!(transaction_id = %tx_id, error = %e, "Failed to mark transaction failed");
        }
    }

    // ============================================================
    // Internal transfers
    // ============================================================

    /// Move funds between two ledger accounts as one atomic unit.
    ///
    /// Once validated under both locks the attempt runs on its own task, so a
    /// caller that stops waiting never leaves it half applied.
    pub async fn transfer(&self, req: TransferRequest) -> LedgerResult<Transaction> {
        let mut state = TransferState::Initiated;

        let sender = self.accounts.get_by_id(req.sender_id).await?;
        let recipient = self.accounts.get_by_email(&req.recipient_email).await?;
        check_parties(&sender, &recipient)?;
        require_positive(req.amount)?;

        if let Some(prior) = self.idempotent_replay(&req, recipient.id).await? {
            return Ok(prior);
        }
        // Advisory check; repeated under the locks
        if !sender.balance().can_cover(req.amount) {
            return Err(LedgerError::InsufficientFunds);
        }

        let (from, to) = lock_pair(
            &self.accounts,
            sender.id,
            recipient.id,
            self.config.lock_timeout,
        )
        .await?;

        check_parties(&from, &to)?;
        if let Some(prior) = self.idempotent_replay(&req, recipient.id).await? {
            return Ok(prior);
        }
        if !from.balance().can_cover(req.amount) {
            return Err(LedgerError::InsufficientFunds);
        }
        state.advance(TransferState::Validated)?;

        let description = req
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Payment to {}", to.full_name));
        let new_tx = NewTransaction::transfer(from.id, to.id, req.amount)
            .with_description(Some(description))
            .with_idempotency_key(req.idempotency_key.clone());

        let engine = self.clone();
        tokio::spawn(async move { engine.run_locked_transfer(new_tx, state, from, to).await })
            .await
            .map_err(|e| LedgerError::SystemError(format!("transfer task failed: {}", e)))?
    }

    /// Append, apply and commit while holding both guards; they are released
    /// when this returns.
    async fn run_locked_transfer(
        &self,
        new_tx: NewTransaction,
        mut state: TransferState,
        mut from: AccountGuard,
        mut to: AccountGuard,
    ) -> LedgerResult<Transaction> {
        let tx = self.ledger.append(new_tx).await.map_err(into_system)?;

        let before = (from.balance(), to.balance());
        match self.apply_transfer(&tx, &mut state, &mut from, &mut to).await {
            Ok(()) => {
                state.advance(TransferState::Committed)?;
                let committed = match self
                    .ledger
                    .record_transition(tx.id, TransactionStatus::Completed, None, None)
                    .await
                {
                    Ok(committed) => committed,
                    Err(e) => {
                        // Commit is durable; recovery will agree with the balances
                        tracing::error!(transaction_id = %tx.id, error = %e, "Committed transfer not published");
                        Transaction {
                            status: TransactionStatus::Completed,
                            ..tx
                        }
                    }
                };
                tracing::info!(
                    transaction_id = %committed.id,
                    from = %committed.from_account_id.map(|id| id.to_string()).unwrap_or_default(),
                    to = %committed.to_account_id.map(|id| id.to_string()).unwrap_or_default(),
                    amount = %committed.amount,
                    "Transfer committed"
                );
                Ok(committed)
            }
            Err(e) => {
                // Nothing was published; the guards still hold `before`
                if state.is_in_flight() {
                    state.advance(TransferState::RolledBack)?;
                }
                state.advance(TransferState::Failed)?;

                let reason = failure_reason(&e);
                self.compensate(
                    tx.id,
                    &reason,
                    vec![
                        BalanceEntry::new(from.id, before.0),
                        BalanceEntry::new(to.id, before.1),
                    ],
                )
                .await;
                tracing::warn!(transaction_id = %tx.id, %state, error = %e, "Transfer rolled back");
                Err(into_system(e))
            }
        }
    }

    /// Stage the debit and credit, write the commit record, then publish both
    /// balances. Leaves `state` at `Credited` on success; the caller owns
    /// rollback.
    async fn apply_transfer(
        &self,
        tx: &Transaction,
        state: &mut TransferState,
        from: &mut AccountGuard,
        to: &mut AccountGuard,
    ) -> LedgerResult<()> {
        let debited = from.balance_after(BalanceChange::Debit(tx.amount))?;
        state.advance(TransferState::Debited)?;
        let credited = to.balance_after(BalanceChange::Credit(tx.amount))?;
        state.advance(TransferState::Credited)?;

        self.write_commit(&JournalRecord::FundsMoved {
            transaction_id: tx.id,
            status: TransactionStatus::Completed,
            failure_reason: None,
            external_reference: None,
            balances: vec![
                BalanceEntry::new(from.id, debited),
                BalanceEntry::new(to.id, credited),
            ],
        })
        .await?;
        from.set_balance(debited);
        to.set_balance(credited);
        Ok(())
    }

    /// A prior live attempt with the same key from the same sender
    async fn idempotent_replay(
        &self,
        req: &TransferRequest,
        recipient_id: AccountId,
    ) -> LedgerResult<Option<Transaction>> {
        let Some(key) = req.idempotency_key.as_deref() else {
            return Ok(None);
        };
        let Some(prior) = self.ledger.find_by_idempotency_key(req.sender_id, key).await else {
            return Ok(None);
        };
        if prior.status == TransactionStatus::Failed {
            return Ok(None);
        }
        let same_request = prior.kind == TransactionKind::Transfer
            && prior.to_account_id == Some(recipient_id)
            && prior.amount == req.amount;
        if !same_request {
            return Err(LedgerError::DuplicateRequest(format!(
                "idempotency key {} was used for a different request",
                key
            )));
        }
        tracing::info!(transaction_id = %prior.id, key, "Idempotent transfer replay");
        Ok(Some(prior))
    }

    // ============================================================
    // External funds movement
    // ============================================================

    /// Credit an account with funds collected by the payment provider
    pub async fn deposit(&self, req: ExternalRequest) -> LedgerResult<Transaction> {
        let provider = self.provider()?;
        require_positive(req.amount)?;

        let account = self.accounts.get_by_id(req.account_id).await?;
        if !account.is_active {
            return Err(LedgerError::AccountInactive(account.email));
        }

        let tx = self
            .ledger
            .append(NewTransaction::deposit(account.id, req.amount).with_description(req.description))
            .await
            .map_err(into_system)?;
        tracing::info!(transaction_id = %tx.id, provider = provider.name(), amount = %tx.amount, "Deposit requested");

        let outcome = provider.collect(tx.id, account.id, tx.amount).await;
        self.finish_external(&tx, outcome).await
    }

    /// Reserve funds, then pay them out through the payment provider
    pub async fn withdraw(&self, req: ExternalRequest) -> LedgerResult<Transaction> {
        let provider = self.provider()?;
        require_positive(req.amount)?;

        let tx = {
            let mut guard =
                lock_one(&self.accounts, req.account_id, self.config.lock_timeout).await?;
            if !guard.is_active {
                return Err(LedgerError::AccountInactive(guard.email.clone()));
            }
            if !guard.balance().can_cover(req.amount) {
                return Err(LedgerError::InsufficientFunds);
            }

            let tx = self
                .ledger
                .append(
                    NewTransaction::withdrawal(guard.id, req.amount)
                        .with_description(req.description),
                )
                .await
                .map_err(into_system)?;

            let original = guard.balance();
            let reserve = guard
                .balance_after(BalanceChange::Debit(tx.amount))
                .map_err(|e| into_system(e.into()));
            let reserved = match reserve {
                Ok(next) => self
                    .write_commit(&JournalRecord::FundsMoved {
                        transaction_id: tx.id,
                        status: TransactionStatus::Pending,
                        failure_reason: None,
                        external_reference: None,
                        balances: vec![BalanceEntry::new(guard.id, next)],
                    })
                    .await
                    .map(|()| next),
                Err(e) => Err(e),
            };
            match reserved {
                Ok(next) => guard.set_balance(next),
                Err(e) => {
                    let reason = failure_reason(&e);
                    self.compensate(tx.id, &reason, vec![BalanceEntry::new(guard.id, original)])
                        .await;
                    tracing::warn!(transaction_id = %tx.id, error = %e, "Withdrawal reserve failed");
                    return Err(into_system(e));
                }
            }
            tx
        };
        tracing::info!(transaction_id = %tx.id, provider = provider.name(), amount = %tx.amount, "Withdrawal reserved");

        let outcome = provider.payout(tx.id, req.account_id, tx.amount).await;
        self.finish_external(&tx, outcome).await
    }

    /// Apply a provider outcome right after the call; declines surface as
    /// `PaymentDeclined`
    async fn finish_external(&self, tx: &Transaction, outcome: OpResult) -> LedgerResult<Transaction> {
        let declined = match &outcome {
            OpResult::Failed(reason) => Some(reason.clone()),
            _ => None,
        };
        let settled = self.resolve_external(tx, outcome).await?;
        match declined {
            Some(reason) => {
                tracing::warn!(transaction_id = %tx.id, kind = %tx.kind, reason = %reason, "Payment declined");
                Err(LedgerError::PaymentDeclined(reason))
            }
            None => Ok(settled),
        }
    }

    /// Resolve a pending deposit or withdrawal whose outcome the provider
    /// reported later
    pub async fn settle_external(
        &self,
        tx_id: TransactionId,
        outcome: OpResult,
    ) -> LedgerResult<Transaction> {
        let tx = self
            .ledger
            .get(tx_id)
            .await
            .ok_or_else(|| LedgerError::TransactionNotFound(tx_id.to_string()))?;
        self.resolve_external(&tx, outcome).await
    }

    /// Every external status change happens under the account lock, after
    /// re-checking the entry is still pending.
    async fn resolve_external(
        &self,
        tx: &Transaction,
        outcome: OpResult,
    ) -> LedgerResult<Transaction> {
        let account_id = match tx.kind {
            TransactionKind::Deposit => tx.to_account_id,
            TransactionKind::Withdrawal => tx.from_account_id,
            TransactionKind::Transfer => None,
        }
        .ok_or_else(|| {
            LedgerError::InvalidStateTransition(format!(
                "{} {} is not settled externally",
                tx.kind, tx.id
            ))
        })?;

        let mut guard = lock_one(&self.accounts, account_id, self.config.lock_timeout).await?;
        let current = self
            .ledger
            .get(tx.id)
            .await
            .ok_or_else(|| LedgerError::TransactionNotFound(tx.id.to_string()))?;
        if current.status.is_terminal() {
            return Err(LedgerError::InvalidStateTransition(format!(
                "transaction {} is already {}",
                current.id, current.status
            )));
        }

        let settled = match (current.kind, outcome) {
            (_, OpResult::Pending) => return Ok(current),
            (TransactionKind::Deposit, OpResult::Success(reference)) => {
                self.move_external(
                    &mut guard,
                    &current,
                    BalanceChange::Credit(current.amount),
                    TransactionStatus::Completed,
                    None,
                    Some(reference),
                )
                .await?
            }
            (TransactionKind::Deposit, OpResult::Failed(reason)) => {
                self.ledger
                    .set_status(current.id, TransactionStatus::Failed, Some(reason))
                    .await?
            }
            (TransactionKind::Withdrawal, OpResult::Success(reference)) => {
                self.ledger
                    .set_status_with_reference(
                        current.id,
                        TransactionStatus::Completed,
                        None,
                        Some(reference),
                    )
                    .await?
            }
            (TransactionKind::Withdrawal, OpResult::Failed(reason)) => {
                // Refund the reserve
                self.move_external(
                    &mut guard,
                    &current,
                    BalanceChange::Credit(current.amount),
                    TransactionStatus::Failed,
                    Some(reason),
                    None,
                )
                .await?
            }
            (TransactionKind::Transfer, _) => {
                return Err(LedgerError::InvalidStateTransition(format!(
                    "transfer {} is not settled externally",
                    current.id
                )));
            }
        };

        tracing::info!(
            transaction_id = %settled.id,
            kind = %settled.kind,
            status = %settled.status,
            "External transaction settled"
        );
        Ok(settled)
    }

    /// Journal the balance change with the final status, then publish both
    async fn move_external(
        &self,
        guard: &mut AccountGuard,
        tx: &Transaction,
        change: BalanceChange,
        status: TransactionStatus,
        failure_reason: Option<String>,
        external_reference: Option<String>,
    ) -> LedgerResult<Transaction> {
        let next: Balance = guard
            .balance_after(change)
            .map_err(|e| into_system(e.into()))?;
        self.write_commit(&JournalRecord::FundsMoved {
            transaction_id: tx.id,
            status,
            failure_reason: failure_reason.clone(),
            external_reference: external_reference.clone(),
            balances: vec![BalanceEntry::new(guard.id, next)],
        })
        .await?;
        guard.set_balance(next);
        self.ledger
            .record_transition(tx.id, status, failure_reason, external_reference)
            .await
    }
}
