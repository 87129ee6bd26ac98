//! Query Service
//!
//! Read-only projections over the account store and the ledger: per-account
//! history and totals, plus administrative statistics and listings.

use chrono::{DateTime, FixedOffset, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::account::{Account, AccountProfile, AccountStore, CounterpartyInfo};
use crate::core_types::AccountId;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Transaction, TransactionLedger, TransactionStatus};
use crate::money::Amount;

/// Transaction enriched with counterpart identities
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub transaction: Transaction,
    /// `None` for external sources or unknown accounts
    pub from: Option<CounterpartyInfo>,
    pub to: Option<CounterpartyInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TransactionSummary {
    pub total_sent: Amount,
    pub total_received: Amount,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AdminStats {
    pub total_users: usize,
    pub active_users: usize,
    pub daily_transaction_count: usize,
    pub total_volume: Amount,
}

fn add(total: Amount, amount: Amount) -> LedgerResult<Amount> {
    total
        .checked_add(amount)
        .ok_or_else(|| LedgerError::SystemError("aggregate overflow".into()))
}

pub struct QueryService {
    accounts: Arc<AccountStore>,
    ledger: Arc<TransactionLedger>,
    /// Calendar used for "daily" statistics
    reference_offset: FixedOffset,
}

impl QueryService {
    pub fn new(
        accounts: Arc<AccountStore>,
        ledger: Arc<TransactionLedger>,
        reference_offset: FixedOffset,
    ) -> Self {
        Self {
            accounts,
            ledger,
            reference_offset,
        }
    }

    /// Active admin or `Forbidden`
    pub async fn require_admin(&self, requester: AccountId) -> LedgerResult<Account> {
        let account = self
            .accounts
            .get_by_id(requester)
            .await
            .map_err(|_| LedgerError::Forbidden("unknown requester".into()))?;
        if !account.is_admin || !account.is_active {
            return Err(LedgerError::Forbidden(
                "administrator role required".into(),
            ));
        }
        Ok(account)
    }

    async fn party(
        &self,
        cache: &mut FxHashMap<AccountId, Option<CounterpartyInfo>>,
        id: Option<AccountId>,
    ) -> Option<CounterpartyInfo> {
        let id = id?;
        if let Some(known) = cache.get(&id) {
            return known.clone();
        }
        let info = self
            .accounts
            .get_by_id(id)
            .await
            .ok()
            .map(|a| a.counterparty());
        cache.insert(id, info.clone());
        info
    }

    async fn enrich(&self, transactions: Vec<Transaction>) -> Vec<HistoryEntry> {
        let mut cache = FxHashMap::default();
        let mut entries = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let from = self.party(&mut cache, transaction.from_account_id).await;
            let to = self.party(&mut cache, transaction.to_account_id).await;
            entries.push(HistoryEntry {
                transaction,
                from,
                to,
            });
        }
        entries
    }

    /// Newest first
    pub async fn history(&self, account_id: AccountId) -> LedgerResult<Vec<HistoryEntry>> {
        self.accounts.get_by_id(account_id).await?;
        let transactions = self.ledger.list_by_account(account_id).await;
        Ok(self.enrich(transactions).await)
    }

    pub async fn history_page(
        &self,
        account_id: AccountId,
        offset: usize,
        limit: usize,
    ) -> LedgerResult<Vec<HistoryEntry>> {
        self.accounts.get_by_id(account_id).await?;
        let transactions = self
            .ledger
            .list_by_account_page(account_id, offset, limit)
            .await;
        Ok(self.enrich(transactions).await)
    }

    /// Totals over completed entries; `count` covers the whole history
    pub async fn summary(&self, account_id: AccountId) -> LedgerResult<TransactionSummary> {
        self.accounts.get_by_id(account_id).await?;
        let transactions = self.ledger.list_by_account(account_id).await;

        let mut summary = TransactionSummary {
            total_sent: Amount::ZERO,
            total_received: Amount::ZERO,
            count: transactions.len(),
        };
        for tx in &transactions {
            let sent = tx.from_account_id == Some(account_id);
            let received = tx.to_account_id == Some(account_id);
            if sent && received {
                return Err(LedgerError::SystemError(format!(
                    "transaction {} has the same source and destination",
                    tx.id
                )));
            }
            if tx.status != TransactionStatus::Completed {
                continue;
            }
            if sent {
                summary.total_sent = add(summary.total_sent, tx.amount)?;
            } else if received {
                summary.total_received = add(summary.total_received, tx.amount)?;
            }
        }
        Ok(summary)
    }

    pub async fn admin_stats(&self, requester: AccountId) -> LedgerResult<AdminStats> {
        self.admin_stats_at(requester, Utc::now()).await
    }

    /// Statistics with "today" taken from `now` at the reference offset
    pub async fn admin_stats_at(
        &self,
        requester: AccountId,
        now: DateTime<Utc>,
    ) -> LedgerResult<AdminStats> {
        self.require_admin(requester).await?;

        let (total_users, active_users) = self.accounts.counts().await;
        let today = now.with_timezone(&self.reference_offset).date_naive();

        let mut daily_transaction_count = 0;
        let mut total_volume = Amount::ZERO;
        for tx in self.ledger.list_all().await {
            if tx.created_at.with_timezone(&self.reference_offset).date_naive() == today {
                daily_transaction_count += 1;
            }
            if tx.status == TransactionStatus::Completed {
                total_volume = add(total_volume, tx.amount)?;
            }
        }

        Ok(AdminStats {
            total_users,
            active_users,
            daily_transaction_count,
            total_volume,
        })
    }

    /// Oldest first, without credentials
    pub async fn all_accounts(&self, requester: AccountId) -> LedgerResult<Vec<AccountProfile>> {
        self.require_admin(requester).await?;
        Ok(self
            .accounts
            .list_all()
            .await
            .iter()
            .map(AccountProfile::from)
            .collect())
    }

    /// Newest first
    pub async fn all_transactions(&self, requester: AccountId) -> LedgerResult<Vec<HistoryEntry>> {
        self.require_admin(requester).await?;
        let transactions = self.ledger.list_all().await;
        Ok(self.enrich(transactions).await)
    }
}
