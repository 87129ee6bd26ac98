//! Ordered account locking
//!
//! Two-account operations always lock the lower `AccountId` first, so no two
//! transfers can wait on each other in a cycle.

use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use crate::account::{Account, AccountStore};
use crate::core_types::AccountId;
use crate::error::{LedgerError, LedgerResult};

pub(crate) type AccountGuard = OwnedMutexGuard<Account>;

fn lock_timeout_error(ids: &[AccountId], timeout: Duration) -> LedgerError {
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    LedgerError::SystemError(format!(
        "timed out after {}ms waiting for account lock ({})",
        timeout.as_millis(),
        ids.join(", ")
    ))
}

/// Lock `a` and `b` in ascending id order; guards are returned as `(a, b)`.
///
/// On timeout nothing stays locked: a guard acquired for the first id is
/// dropped with the cancelled future.
pub(crate) async fn lock_pair(
    store: &AccountStore,
    a: AccountId,
    b: AccountId,
    timeout: Duration,
) -> LedgerResult<(AccountGuard, AccountGuard)> {
    if a == b {
        return Err(LedgerError::SelfTransfer);
    }
    let handle_a = store.handle(a)?;
    let handle_b = store.handle(b)?;
    let a_first = a < b;
    let (low, high) = if a_first {
        (handle_a, handle_b)
    } else {
        (handle_b, handle_a)
    };

    let acquire = async move {
        let low_guard = low.lock_owned().await;
        let high_guard = high.lock_owned().await;
        (low_guard, high_guard)
    };
    let (low_guard, high_guard) = tokio::time::timeout(timeout, acquire)
        .await
        .map_err(|_| lock_timeout_error(&[a, b], timeout))?;

    Ok(if a_first {
        (low_guard, high_guard)
    } else {
        (high_guard, low_guard)
    })
}

pub(crate) async fn lock_one(
    store: &AccountStore,
    id: AccountId,
    timeout: Duration,
) -> LedgerResult<AccountGuard> {
    let handle = store.handle(id)?;
    tokio::time::timeout(timeout, handle.lock_owned())
        .await
        .map_err(|_| lock_timeout_error(&[id], timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountSettings, CredentialHasher, NewAccount};
    use crate::journal::MemoryJournal;
    use std::sync::Arc;

    async fn store_with_two() -> (Arc<AccountStore>, AccountId, AccountId) {
        let store = Arc::new(AccountStore::new(
            Arc::new(MemoryJournal::new()),
            AccountSettings {
                hasher: CredentialHasher::new(1024, 1, 1).unwrap(),
                ..AccountSettings::default()
            },
        ));
        let mut ids = Vec::new();
        for name in ["alice", "bob"] {
            let account = store
                .create_account(NewAccount {
                    username: name.into(),
                    email: format!("{}@example.com", name),
                    password: "secret1".into(),
                    full_name: name.into(),
                    phone: "1".into(),
                })
                .await
                .unwrap();
            ids.push(account.id);
        }
        (store, ids[0], ids[1])
    }

    #[tokio::test]
    async fn test_guards_follow_argument_order() {
        let (store, a, b) = store_with_two().await;
        let timeout = Duration::from_millis(100);

        let (ga, gb) = lock_pair(&store, a, b, timeout).await.unwrap();
        assert_eq!((ga.id, gb.id), (a, b));
        drop((ga, gb));

        let (gb, ga) = lock_pair(&store, b, a, timeout).await.unwrap();
        assert_eq!((gb.id, ga.id), (b, a));
    }

    #[tokio::test]
    async fn test_timeout_releases_everything() {
        let (store, a, b) = store_with_two().await;
        let timeout = Duration::from_millis(50);

        let held = lock_one(&store, b, timeout).await.unwrap();
        let err = lock_pair(&store, a, b, timeout).await.unwrap_err();
        assert!(matches!(err, LedgerError::SystemError(_)));

        // `a` was not left locked by the cancelled attempt
        drop(lock_one(&store, a, timeout).await.unwrap());
        drop(held);
        assert!(lock_pair(&store, b, a, timeout).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_same_and_unknown_accounts() {
        let (store, a, _) = store_with_two().await;
        let timeout = Duration::from_millis(50);
        assert_eq!(
            lock_pair(&store, a, a, timeout).await.err(),
            Some(LedgerError::SelfTransfer)
        );
        assert!(matches!(
            lock_pair(&store, a, AccountId::new(), timeout).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_opposite_orders_do_not_deadlock() {
        let (store, a, b) = store_with_two().await;
        let mut tasks = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
            tasks.push(tokio::spawn(async move {
                let guards = lock_pair(&store, x, y, Duration::from_secs(5)).await.unwrap();
                tokio::task::yield_now().await;
                drop(guards);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }
}
