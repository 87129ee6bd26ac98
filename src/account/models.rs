//! Account records and the DTOs derived from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::balance::{Balance, BalanceError};
use crate::core_types::AccountId;
use crate::money::Amount;

/// A registered account: identity, credentials and balance.
///
/// `balance` is private; it changes only through [`Account::apply`] while the
/// caller holds the account's mutex in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Stored lowercase
    pub email: String,
    pub full_name: String,
    pub phone: String,
    /// argon2 PHC string
    pub(crate) password_hash: String,
    balance: Balance,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Single-account balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    Credit(Amount),
    Debit(Amount),
}

impl BalanceChange {
    pub fn amount(&self) -> Amount {
        match self {
            BalanceChange::Credit(a) | BalanceChange::Debit(a) => *a,
        }
    }
}

impl Account {
    pub(crate) fn new(
        registration: &NewAccount,
        email: String,
        password_hash: String,
        starting_balance: Amount,
        is_admin: bool,
    ) -> Self {
        Self {
            id: AccountId::new(),
            username: registration.username.trim().to_string(),
            email,
            full_name: registration.full_name.trim().to_string(),
            phone: registration.phone.trim().to_string(),
            password_hash,
            balance: Balance::new(starting_balance),
            is_active: true,
            is_admin,
            created_at: Utc::now(),
        }
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    /// Balance after `change`, leaving the account untouched
    pub(crate) fn balance_after(&self, change: BalanceChange) -> Result<Balance, BalanceError> {
        let mut next = self.balance;
        match change {
            BalanceChange::Credit(amount) => next.credit(amount)?,
            BalanceChange::Debit(amount) => next.debit(amount)?,
        }
        Ok(next)
    }

    /// Overwrite with a journaled or saved value (commit, rollback, replay)
    pub(crate) fn set_balance(&mut self, balance: Balance) {
        self.balance = balance;
    }

    pub fn profile(&self) -> AccountProfile {
        AccountProfile::from(self)
    }

    pub fn counterparty(&self) -> CounterpartyInfo {
        CounterpartyInfo {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Registration input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 3, max = 64, message = "username must be 3-64 characters"))]
    pub username: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 128, message = "full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, max = 32, message = "phone is required"))]
    pub phone: String,
}

/// Public view of an account (no credentials)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AccountProfile {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub balance: Amount,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            username: a.username.clone(),
            email: a.email.clone(),
            full_name: a.full_name.clone(),
            phone: a.phone.clone(),
            balance: a.balance.amount(),
            is_active: a.is_active,
            is_admin: a.is_admin,
            created_at: a.created_at,
        }
    }
}

/// Counterpart identity attached to history entries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterpartyInfo {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
}

/// Lowercased, trimmed email used as the unique key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> NewAccount {
        NewAccount {
            username: "alice".into(),
            email: "Alice@Example.com".into(),
            password: "secret1".into(),
            full_name: "Alice Smith".into(),
            phone: "555-0100".into(),
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration().validate().is_ok());

        let mut bad = registration();
        bad.email = "not-an-email".into();
        assert!(bad.validate().is_err());

        let mut bad = registration();
        bad.password = "12345".into();
        assert!(bad.validate().is_err());

        let mut bad = registration();
        bad.username = "ab".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_apply_and_preview() {
        let reg = registration();
        let mut account = Account::new(
            &reg,
            normalize_email(&reg.email),
            "hash".into(),
            Amount::from_cents(1_000),
            false,
        );
        assert_eq!(account.email, "alice@example.com");

        let preview = account
            .balance_after(BalanceChange::Debit(Amount::from_cents(400)))
            .unwrap();
        assert_eq!(preview.amount(), Amount::from_cents(600));
        assert_eq!(account.balance().amount(), Amount::from_cents(1_000));

        assert!(
            account
                .balance_after(BalanceChange::Debit(Amount::from_cents(2_000)))
                .is_err()
        );
        let next = account
            .balance_after(BalanceChange::Credit(Amount::from_cents(500)))
            .unwrap();
        account.set_balance(next);
        assert_eq!(account.balance().amount(), Amount::from_cents(1_500));
    }

    #[test]
    fn test_profile_has_no_credentials() {
        let reg = registration();
        let account = Account::new(&reg, reg.email.clone(), "phc".into(), Amount::ZERO, true);
        let json = serde_json::to_value(account.profile()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["balance"], "0.00");
        assert_eq!(json["is_admin"], true);
    }
}
