use dashmap::DashMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use validator::Validate;

use super::credentials::CredentialHasher;
use super::models::{Account, BalanceChange, NewAccount, normalize_email};
use crate::core_types::AccountId;
use crate::error::{LedgerError, LedgerResult};
use crate::journal::{BalanceEntry, Journal, JournalRecord};
use crate::money::Amount;

/// Shared handle to one account record
pub(crate) type AccountHandle = Arc<Mutex<Account>>;

/// Registration policy
#[derive(Debug, Clone)]
pub struct AccountSettings {
    pub starting_balance: Amount,
    /// Registrations with these emails get the admin role
    pub admin_emails: Vec<String>,
    pub hasher: CredentialHasher,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            starting_balance: Amount::from_cents(100_000),
            admin_emails: Vec::new(),
            hasher: CredentialHasher::default(),
        }
    }
}

/// Account store.
///
/// Each account sits behind its own async mutex; the transfer engine locks
/// two of them in ascending id order. Map lookups clone the `Arc` out so no
/// shard guard is ever held across an await.
pub struct AccountStore {
    accounts: DashMap<AccountId, AccountHandle>,
    by_email: DashMap<String, AccountId>,
    /// Lowercased usernames
    by_username: DashMap<String, AccountId>,
    /// Serializes the uniqueness check with the insert
    registration: Mutex<()>,
    journal: Arc<dyn Journal>,
    hasher: CredentialHasher,
    starting_balance: Amount,
    admin_emails: FxHashSet<String>,
}

impl AccountStore {
    pub fn new(journal: Arc<dyn Journal>, settings: AccountSettings) -> Self {
        Self::with_accounts(journal, settings, Vec::new())
    }

    /// Restore from recovered state
    pub fn with_accounts(
        journal: Arc<dyn Journal>,
        settings: AccountSettings,
        accounts: Vec<Account>,
    ) -> Self {
        let store = Self {
            accounts: DashMap::new(),
            by_email: DashMap::new(),
            by_username: DashMap::new(),
            registration: Mutex::new(()),
            journal,
            hasher: settings.hasher,
            starting_balance: settings.starting_balance,
            admin_emails: settings
                .admin_emails
                .iter()
                .map(|e| normalize_email(e))
                .collect(),
        };
        for account in accounts {
            store.index(account);
        }
        store
    }

    fn index(&self, account: Account) {
        let id = account.id;
        self.by_email.insert(account.email.clone(), id);
        self.by_username
            .insert(account.username.to_lowercase(), id);
        self.accounts.insert(id, Arc::new(Mutex::new(account)));
    }

    pub(crate) fn handle(&self, id: AccountId) -> LedgerResult<AccountHandle> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Exclusive access for the transfer engine
    pub(crate) async fn lock(&self, id: AccountId) -> LedgerResult<OwnedMutexGuard<Account>> {
        Ok(self.handle(id)?.lock_owned().await)
    }

    pub async fn get_by_id(&self, id: AccountId) -> LedgerResult<Account> {
        let handle = self.handle(id)?;
        let account = handle.lock().await;
        Ok(account.clone())
    }

    /// Case-insensitive
    pub async fn get_by_email(&self, email: &str) -> LedgerResult<Account> {
        let email = normalize_email(email);
        let id = self
            .by_email
            .get(&email)
            .map(|entry| *entry.value())
            .ok_or(LedgerError::AccountNotFound(email))?;
        self.get_by_id(id).await
    }

    fn check_unique(&self, email: &str, username: &str) -> LedgerResult<()> {
        if self.by_email.contains_key(email) {
            return Err(LedgerError::DuplicateAccount(format!(
                "email {} is already registered",
                email
            )));
        }
        if self.by_username.contains_key(&username.to_lowercase()) {
            return Err(LedgerError::DuplicateAccount(format!(
                "username {} is taken",
                username
            )));
        }
        Ok(())
    }

    pub async fn create_account(&self, registration: NewAccount) -> LedgerResult<Account> {
        registration
            .validate()
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        let email = normalize_email(&registration.email);
        let username = registration.username.trim().to_string();
        self.check_unique(&email, &username)?;

        let hasher = self.hasher.clone();
        let password = registration.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| LedgerError::SystemError(format!("hashing task failed: {}", e)))??;

        let _registration = self.registration.lock().await;
        // Re-check: another registration may have won the race
        self.check_unique(&email, &username)?;

        let is_admin = self.admin_emails.contains(&email);
        let account = Account::new(
            &registration,
            email,
            password_hash,
            self.starting_balance,
            is_admin,
        );
        self.journal
            .append(&JournalRecord::AccountCreated(account.clone()))
            .await?;
        self.index(account.clone());

        tracing::info!(
            account_id = %account.id,
            username = %account.username,
            is_admin,
            "Account created"
        );
        Ok(account)
    }

    /// Read-modify-write under the account mutex
    pub async fn adjust_balance(
        &self,
        id: AccountId,
        change: BalanceChange,
    ) -> LedgerResult<Account> {
        if change.amount().is_zero() {
            return Err(LedgerError::InvalidAmount("amount must be positive".into()));
        }
        let mut account = self.lock(id).await?;
        let next = account.balance_after(change)?;
        self.journal
            .append(&JournalRecord::BalanceAdjusted(BalanceEntry::new(id, next)))
            .await?;
        account.set_balance(next);

        tracing::debug!(account_id = %id, ?change, balance = %next.amount(), "Balance adjusted");
        Ok(account.clone())
    }

    pub async fn set_active(&self, id: AccountId, is_active: bool) -> LedgerResult<Account> {
        let mut account = self.lock(id).await?;
        if account.is_active != is_active {
            self.journal
                .append(&JournalRecord::AccountStatusChanged {
                    account_id: id,
                    is_active,
                })
                .await?;
            account.is_active = is_active;
            tracing::info!(account_id = %id, is_active, "Account status changed");
        }
        Ok(account.clone())
    }

    /// `None` for unknown email, inactive account or wrong password
    pub async fn validate_credentials(&self, email: &str, password: &str) -> Option<Account> {
        let account = self.get_by_email(email).await.ok()?;
        if !account.is_active {
            return None;
        }
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let phc = account.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &phc))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Credential verification task failed");
                false
            });
        verified.then_some(account)
    }

    /// Oldest first
    pub async fn list_all(&self) -> Vec<Account> {
        let handles: Vec<AccountHandle> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        // One busy account does not stall the others
        let mut accounts =
            futures::future::join_all(handles.iter().map(|handle| async move {
                handle.lock().await.clone()
            }))
            .await;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        accounts
    }

    /// (total, active)
    pub async fn counts(&self) -> (usize, usize) {
        let accounts = self.list_all().await;
        let active = accounts.iter().filter(|a| a.is_active).count();
        (accounts.len(), active)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
