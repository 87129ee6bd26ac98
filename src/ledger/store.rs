use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::{NewTransaction, Transaction, TransactionKind, TransactionStatus};
use crate::core_types::{AccountId, TransactionId};
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{Journal, JournalRecord};

#[derive(Default)]
struct LedgerIndex {
    /// Append order
    entries: Vec<Transaction>,
    by_id: FxHashMap<TransactionId, usize>,
    by_account: FxHashMap<AccountId, Vec<usize>>,
    /// (originating account, key) -> latest attempt
    by_key: FxHashMap<(AccountId, String), usize>,
}

impl LedgerIndex {
    fn insert(&mut self, tx: Transaction) {
        let idx = self.entries.len();
        self.by_id.insert(tx.id, idx);
        for account in [tx.from_account_id, tx.to_account_id].into_iter().flatten() {
            let positions = self.by_account.entry(account).or_default();
            if positions.last() != Some(&idx) {
                positions.push(idx);
            }
        }
        if let (Some(owner), Some(key)) = (key_owner(&tx), tx.idempotency_key.clone()) {
            self.by_key.insert((owner, key), idx);
        }
        self.entries.push(tx);
    }

    fn get_mut(&mut self, id: TransactionId) -> LedgerResult<&mut Transaction> {
        let idx = *self
            .by_id
            .get(&id)
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))?;
        Ok(&mut self.entries[idx])
    }

    fn newest_first(&self, positions: &[usize]) -> impl Iterator<Item = &Transaction> {
        positions.iter().rev().map(|&idx| &self.entries[idx])
    }
}

/// Idempotency keys are scoped to the account that initiated the movement
fn key_owner(tx: &Transaction) -> Option<AccountId> {
    match tx.kind {
        TransactionKind::Deposit => tx.to_account_id,
        TransactionKind::Transfer | TransactionKind::Withdrawal => tx.from_account_id,
    }
}

fn validate_shape(new: &NewTransaction) -> LedgerResult<()> {
    if new.amount.is_zero() {
        return Err(LedgerError::InvalidAmount("amount must be positive".into()));
    }
    match (new.kind, new.from_account_id, new.to_account_id) {
        (TransactionKind::Transfer, Some(from), Some(to)) if from == to => {
            Err(LedgerError::SelfTransfer)
        }
        (TransactionKind::Transfer, Some(_), Some(_))
        | (TransactionKind::Deposit, None, Some(_))
        | (TransactionKind::Withdrawal, Some(_), None) => Ok(()),
        (kind, _, _) => Err(LedgerError::Validation(format!(
            "{} has invalid endpoints",
            kind
        ))),
    }
}

fn check_transition(tx: &Transaction, to: TransactionStatus) -> LedgerResult<()> {
    if tx.status.is_terminal() {
        return Err(LedgerError::InvalidStateTransition(format!(
            "transaction {} is already {}",
            tx.id, tx.status
        )));
    }
    if !to.is_terminal() {
        return Err(LedgerError::InvalidStateTransition(format!(
            "transaction {}: {} -> {}",
            tx.id, tx.status, to
        )));
    }
    Ok(())
}

fn apply_transition(
    tx: &mut Transaction,
    status: TransactionStatus,
    failure_reason: Option<String>,
    external_reference: Option<String>,
) {
    tx.status = status;
    if failure_reason.is_some() {
        tx.failure_reason = failure_reason;
    }
    if external_reference.is_some() {
        tx.external_reference = external_reference;
    }
}

/// Transaction store.
///
/// Writers hold the index write lock while journaling, so journal order
/// equals index order. Lock order: account mutexes first, then this lock.
pub struct TransactionLedger {
    index: RwLock<LedgerIndex>,
    journal: Arc<dyn Journal>,
}

impl TransactionLedger {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self::with_transactions(journal, Vec::new())
    }

    /// Restore from recovered state (append order)
    pub fn with_transactions(journal: Arc<dyn Journal>, transactions: Vec<Transaction>) -> Self {
        let mut index = LedgerIndex::default();
        for tx in transactions {
            index.insert(tx);
        }
        Self {
            index: RwLock::new(index),
            journal,
        }
    }

    /// Assign id and timestamp, journal, then publish.
    pub async fn append(&self, new: NewTransaction) -> LedgerResult<Transaction> {
        validate_shape(&new)?;
        let tx = new.into_transaction();

        let mut index = self.index.write().await;
        if let (Some(owner), Some(key)) = (key_owner(&tx), tx.idempotency_key.as_ref()) {
            let live = index
                .by_key
                .get(&(owner, key.clone()))
                .map(|&idx| &index.entries[idx])
                .filter(|prior| prior.status != TransactionStatus::Failed);
            if let Some(prior) = live {
                return Err(LedgerError::DuplicateRequest(format!(
                    "idempotency key already used by {}",
                    prior.id
                )));
            }
        }

        self.journal
            .append(&JournalRecord::TransactionAppended(tx.clone()))
            .await?;
        index.insert(tx.clone());

        tracing::debug!(
            transaction_id = %tx.id,
            kind = %tx.kind,
            status = %tx.status,
            amount = %tx.amount,
            "Transaction appended"
        );
        Ok(tx)
    }

    /// `pending -> completed|failed`, journaled
    pub async fn set_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        failure_reason: Option<String>,
    ) -> LedgerResult<Transaction> {
        self.set_status_with_reference(id, status, failure_reason, None)
            .await
    }

    pub(crate) async fn set_status_with_reference(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        failure_reason: Option<String>,
        external_reference: Option<String>,
    ) -> LedgerResult<Transaction> {
        let mut index = self.index.write().await;
        let tx = index.get_mut(id)?;
        check_transition(tx, status)?;

        self.journal
            .append(&JournalRecord::TransactionStatusChanged {
                transaction_id: id,
                status,
                failure_reason: failure_reason.clone(),
                external_reference: external_reference.clone(),
            })
            .await?;
        apply_transition(tx, status, failure_reason, external_reference);

        tracing::debug!(transaction_id = %id, %status, "Transaction status changed");
        Ok(tx.clone())
    }

    /// Publish a transition already made durable by a `FundsMoved` record
    pub(crate) async fn record_transition(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        failure_reason: Option<String>,
        external_reference: Option<String>,
    ) -> LedgerResult<Transaction> {
        let mut index = self.index.write().await;
        let tx = index.get_mut(id)?;
        check_transition(tx, status)?;
        apply_transition(tx, status, failure_reason, external_reference);
        Ok(tx.clone())
    }

    pub async fn get(&self, id: TransactionId) -> Option<Transaction> {
        let index = self.index.read().await;
        index.by_id.get(&id).map(|&idx| index.entries[idx].clone())
    }

    /// Newest first
    pub async fn list_by_account(&self, account_id: AccountId) -> Vec<Transaction> {
        let index = self.index.read().await;
        match index.by_account.get(&account_id) {
            Some(positions) => index.newest_first(positions).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// One page of [`Self::list_by_account`]
    pub async fn list_by_account_page(
        &self,
        account_id: AccountId,
        offset: usize,
        limit: usize,
    ) -> Vec<Transaction> {
        let index = self.index.read().await;
        match index.by_account.get(&account_id) {
            Some(positions) => index
                .newest_first(positions)
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Newest first
    pub async fn list_all(&self) -> Vec<Transaction> {
        let index = self.index.read().await;
        index.entries.iter().rev().cloned().collect()
    }

    /// Append order, for snapshots
    pub async fn export(&self) -> Vec<Transaction> {
        self.index.read().await.entries.clone()
    }

    /// Latest attempt carrying `key` initiated by `account_id`
    pub async fn find_by_idempotency_key(
        &self,
        account_id: AccountId,
        key: &str,
    ) -> Option<Transaction> {
        let index = self.index.read().await;
        index
            .by_key
            .get(&(account_id, key.to_string()))
            .map(|&idx| index.entries[idx].clone())
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use crate::journal::mock::FaultyJournal;
    use crate::journal::wal::WalEntryType;
    use crate::money::Amount;

    fn ledger() -> TransactionLedger {
        TransactionLedger::new(Arc::new(MemoryJournal::new()))
    }

    fn cents(c: u64) -> Amount {
        Amount::from_cents(c)
    }

    #[tokio::test]
    async fn test_append_assigns_id_and_lists_newest_first() {
        let ledger = ledger();
        let a = AccountId::new();
        let b = AccountId::new();
        let c = AccountId::new();

        let first = ledger.append(NewTransaction::transfer(a, b, cents(100))).await.unwrap();
        let second = ledger.append(NewTransaction::transfer(c, a, cents(200))).await.unwrap();
        let _other = ledger.append(NewTransaction::transfer(b, c, cents(300))).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.status, TransactionStatus::Pending);

        let history = ledger.list_by_account(a).await;
        let ids: Vec<_> = history.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let all = ledger.list_all().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].id, first.id);
        assert!(ledger.list_by_account(AccountId::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_paging_is_restartable() {
        let ledger = ledger();
        let a = AccountId::new();
        for c in 1..=5 {
            ledger.append(NewTransaction::deposit(a, cents(c))).await.unwrap();
        }
        let page1 = ledger.list_by_account_page(a, 0, 2).await;
        let page2 = ledger.list_by_account_page(a, 2, 2).await;
        let page3 = ledger.list_by_account_page(a, 4, 2).await;
        assert_eq!(page1.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![cents(5), cents(4)]);
        assert_eq!(page2.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![cents(3), cents(2)]);
        assert_eq!(page3.len(), 1);
        assert!(ledger.list_by_account_page(a, 10, 2).await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_malformed_entries() {
        let ledger = ledger();
        let a = AccountId::new();
        assert!(matches!(
            ledger.append(NewTransaction::transfer(a, AccountId::new(), Amount::ZERO)).await,
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(
            ledger.append(NewTransaction::transfer(a, a, cents(1))).await,
            Err(LedgerError::SelfTransfer)
        );
        let mut bad = NewTransaction::deposit(a, cents(1));
        bad.from_account_id = Some(AccountId::new());
        assert!(matches!(ledger.append(bad).await, Err(LedgerError::Validation(_))));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let ledger = ledger();
        let tx = ledger
            .append(NewTransaction::deposit(AccountId::new(), cents(10)))
            .await
            .unwrap();

        assert!(matches!(
            ledger.set_status(tx.id, TransactionStatus::Pending, None).await,
            Err(LedgerError::InvalidStateTransition(_))
        ));

        let done = ledger
            .set_status(tx.id, TransactionStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);

        // Terminal states are immutable
        for status in [TransactionStatus::Failed, TransactionStatus::Completed] {
            assert!(matches!(
                ledger.set_status(tx.id, status, None).await,
                Err(LedgerError::InvalidStateTransition(_))
            ));
        }
        assert_eq!(ledger.get(tx.id).await.unwrap().status, TransactionStatus::Completed);

        assert!(matches!(
            ledger
                .set_status(TransactionId::new(), TransactionStatus::Failed, None)
                .await,
            Err(LedgerError::TransactionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_directly_terminal_append() {
        let ledger = ledger();
        let tx = ledger
            .append(
                NewTransaction::withdrawal(AccountId::new(), cents(10))
                    .with_status(TransactionStatus::Completed),
            )
            .await
            .unwrap();
        assert!(ledger
            .set_status(tx.id, TransactionStatus::Failed, Some("late".into()))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_idempotency_key_scope() {
        let ledger = ledger();
        let a = AccountId::new();
        let b = AccountId::new();
        let key = Some("k-1".to_string());

        let first = ledger
            .append(NewTransaction::transfer(a, b, cents(10)).with_idempotency_key(key.clone()))
            .await
            .unwrap();
        assert_eq!(
            ledger.find_by_idempotency_key(a, "k-1").await.map(|t| t.id),
            Some(first.id)
        );
        assert!(ledger.find_by_idempotency_key(b, "k-1").await.is_none());

        // Live attempt blocks reuse
        assert!(matches!(
            ledger
                .append(NewTransaction::transfer(a, b, cents(10)).with_idempotency_key(key.clone()))
                .await,
            Err(LedgerError::DuplicateRequest(_))
        ));

        // Same key from another sender is independent
        ledger
            .append(NewTransaction::transfer(b, a, cents(10)).with_idempotency_key(key.clone()))
            .await
            .unwrap();

        // A failed attempt frees the key
        ledger
            .set_status(first.id, TransactionStatus::Failed, Some("x".into()))
            .await
            .unwrap();
        let retry = ledger
            .append(NewTransaction::transfer(a, b, cents(10)).with_idempotency_key(key))
            .await
            .unwrap();
        assert_eq!(
            ledger.find_by_idempotency_key(a, "k-1").await.map(|t| t.id),
            Some(retry.id)
        );
    }

    #[tokio::test]
    async fn test_journal_failure_leaves_no_entry() {
        let journal = Arc::new(FaultyJournal::new());
        let ledger = TransactionLedger::new(journal.clone());
        let a = AccountId::new();

        let tx = ledger.append(NewTransaction::deposit(a, cents(1))).await.unwrap();
        journal.set_fail_all(true);

        assert!(matches!(
            ledger.append(NewTransaction::deposit(a, cents(2))).await,
            Err(LedgerError::SystemError(_))
        ));
        assert!(matches!(
            ledger.set_status(tx.id, TransactionStatus::Completed, None).await,
            Err(LedgerError::SystemError(_))
        ));
        assert_eq!(ledger.len().await, 1);
        assert_eq!(ledger.get(tx.id).await.unwrap().status, TransactionStatus::Pending);
        assert_eq!(journal.count(WalEntryType::TransactionAppended), 1);
    }

    #[tokio::test]
    async fn test_record_transition_is_not_journaled() {
        let journal = Arc::new(FaultyJournal::new());
        let ledger = TransactionLedger::new(journal.clone());
        let tx = ledger
            .append(NewTransaction::deposit(AccountId::new(), cents(1)))
            .await
            .unwrap();
        let done = ledger
            .record_transition(tx.id, TransactionStatus::Completed, None, Some("ref-1".into()))
            .await
            .unwrap();
        assert_eq!(done.external_reference.as_deref(), Some("ref-1"));
        assert_eq!(journal.count(WalEntryType::TransactionStatus), 0);
    }

    #[tokio::test]
    async fn test_restore_preserves_order() {
        let source = ledger();
        let a = AccountId::new();
        for c in 1..=3 {
            source.append(NewTransaction::deposit(a, cents(c))).await.unwrap();
        }
        let restored =
            TransactionLedger::with_transactions(Arc::new(MemoryJournal::new()), source.export().await);
        assert_eq!(restored.list_by_account(a).await, source.list_by_account(a).await);
    }
}
