//! Ledger-wide properties checked through the public API of an in-memory bank

use std::sync::Arc;

use bank_ledger::{
    Account, AccountId, Amount, AppConfig, Bank, LedgerError, NewAccount, TransactionStatus,
    TransferRequest,
};

fn config(starting_balance: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.ledger.starting_balance = starting_balance.to_string();
    config.ledger.admin_emails = vec!["admin@bank.test".to_string()];
    config.auth.hash_memory_kib = 1024;
    config.auth.hash_iterations = 1;
    config
}

async fn open_bank(starting_balance: &str) -> Arc<Bank> {
    Arc::new(Bank::open(&config(starting_balance)).await.unwrap())
}

async fn register(bank: &Bank, name: &str) -> Account {
    bank.accounts()
        .create_account(NewAccount {
            username: name.to_string(),
            email: format!("{}@bank.test", name),
            password: "password1".to_string(),
            full_name: format!("{} Example", name),
            phone: "555-0100".to_string(),
        })
        .await
        .unwrap()
}

async fn balance(bank: &Bank, id: AccountId) -> String {
    bank.accounts()
        .get_by_id(id)
        .await
        .unwrap()
        .balance()
        .amount()
        .to_string()
}

fn amt(s: &str) -> Amount {
    s.parse().unwrap()
}

#[tokio::test]
async fn rent_payment_moves_funds_and_shows_in_history() {
    let bank = open_bank("1000.00").await;
    let a = register(&bank, "alice").await;
    let b = register(&bank, "bob").await;

    let tx = bank
        .engine()
        .transfer(TransferRequest::new(a.id, "bob@bank.test", amt("250")).with_description("rent"))
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.description.as_deref(), Some("rent"));

    assert_eq!(balance(&bank, a.id).await, "750.00");
    assert_eq!(balance(&bank, b.id).await, "1250.00");

    for id in [a.id, b.id] {
        let history = bank.query().history(id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction.id, tx.id);
        assert_eq!(history[0].to.as_ref().unwrap().full_name, "bob Example");
    }

    let sent = bank.query().summary(a.id).await.unwrap();
    assert_eq!(sent.total_sent, amt("250"));
    assert_eq!(sent.total_received, Amount::ZERO);
    let received = bank.query().summary(b.id).await.unwrap();
    assert_eq!(received.total_received, amt("250"));
    assert_eq!(received.count, 1);
}

#[tokio::test]
async fn rejected_transfers_leave_no_trace() {
    let bank = open_bank("10.00").await;
    let a = register(&bank, "alice").await;
    let b = register(&bank, "bob").await;

    let result = bank
        .engine()
        .transfer(TransferRequest::new(a.id, b.email.clone(), amt("50")))
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientFunds)));

    let result = bank
        .engine()
        .transfer(TransferRequest::new(a.id, "ALICE@bank.test", amt("1")))
        .await;
    assert!(matches!(result, Err(LedgerError::SelfTransfer)));

    let result = bank
        .engine()
        .transfer(TransferRequest::new(a.id, "nobody@bank.test", amt("1")))
        .await;
    assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));

    assert_eq!(balance(&bank, a.id).await, "10.00");
    assert_eq!(balance(&bank, b.id).await, "10.00");
    assert!(bank.ledger().is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_both_apply() {
    let bank = open_bank("1000.00").await;
    let a = register(&bank, "alice").await;
    let b = register(&bank, "bob").await;

    let forward = {
        let bank = bank.clone();
        let req = TransferRequest::new(a.id, b.email.clone(), amt("100"));
        tokio::spawn(async move { bank.engine().transfer(req).await })
    };
    let backward = {
        let bank = bank.clone();
        let req = TransferRequest::new(b.id, a.email.clone(), amt("30"));
        tokio::spawn(async move { bank.engine().transfer(req).await })
    };
    forward.await.unwrap().unwrap();
    backward.await.unwrap().unwrap();

    assert_eq!(balance(&bank, a.id).await, "930.00");
    assert_eq!(balance(&bank, b.id).await, "1070.00");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_conserve_money() {
    let bank = open_bank("100.00").await;
    let mut accounts = Vec::new();
    for i in 0..6 {
        accounts.push(register(&bank, &format!("user{}", i)).await);
    }
    let accounts = Arc::new(accounts);

    let mut handles = Vec::new();
    for worker in 0..8u64 {
        let bank = bank.clone();
        let accounts = accounts.clone();
        handles.push(tokio::spawn(async move {
            // Deterministic LCG per worker
            let mut seed = worker.wrapping_mul(6364136223846793005).wrapping_add(1);
            for _ in 0..40 {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let from = (seed >> 33) as usize % accounts.len();
                let to = (seed >> 17) as usize % accounts.len();
                let cents = 1 + (seed >> 40) % 5_000;
                let req = TransferRequest::new(
                    accounts[from].id,
                    accounts[to].email.clone(),
                    Amount::from_cents(cents),
                );
                match bank.engine().transfer(req).await {
                    Ok(tx) => assert_eq!(tx.status, TransactionStatus::Completed),
                    Err(LedgerError::InsufficientFunds) | Err(LedgerError::SelfTransfer) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut total = 0u64;
    for account in accounts.iter() {
        let current = bank.accounts().get_by_id(account.id).await.unwrap();
        total += current.balance().amount().cents();
    }
    assert_eq!(total, 60_000);

    // Every recorded transaction is terminal and completed
    for tx in bank.ledger().list_all().await {
        assert_eq!(tx.status, TransactionStatus::Completed);
    }
}

#[tokio::test]
async fn summary_is_a_pure_read() {
    let bank = open_bank("1000.00").await;
    let a = register(&bank, "alice").await;
    let b = register(&bank, "bob").await;
    for cents in [1_000, 2_550, 99] {
        bank.engine()
            .transfer(TransferRequest::new(a.id, b.email.clone(), Amount::from_cents(cents)))
            .await
            .unwrap();
    }
    bank.engine()
        .transfer(TransferRequest::new(b.id, a.email.clone(), amt("5.01")))
        .await
        .unwrap();

    let first = bank.query().summary(a.id).await.unwrap();
    let second = bank.query().summary(a.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total_sent, amt("36.49"));
    assert_eq!(first.total_received, amt("5.01"));
    assert_eq!(first.count, 4);
}

#[tokio::test]
async fn completed_transactions_are_immutable() {
    let bank = open_bank("1000.00").await;
    let a = register(&bank, "alice").await;
    let b = register(&bank, "bob").await;
    let tx = bank
        .engine()
        .transfer(TransferRequest::new(a.id, b.email.clone(), amt("1")))
        .await
        .unwrap();

    let result = bank
        .ledger()
        .set_status(tx.id, TransactionStatus::Failed, Some("late".into()))
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidStateTransition(_))));
    assert_eq!(
        bank.ledger().get(tx.id).await.unwrap().status,
        TransactionStatus::Completed
    );
}

#[tokio::test]
async fn deactivated_accounts_cannot_transact() {
    let bank = open_bank("1000.00").await;
    let admin = register(&bank, "admin").await;
    let a = register(&bank, "alice").await;
    let b = register(&bank, "bob").await;

    bank.set_account_active(admin.id, b.id, false).await.unwrap();
    let result = bank
        .engine()
        .transfer(TransferRequest::new(a.id, b.email.clone(), amt("1")))
        .await;
    assert!(matches!(result, Err(LedgerError::AccountInactive(_))));
    assert!(
        bank.accounts()
            .validate_credentials("bob@bank.test", "password1")
            .await
            .is_none()
    );
}

#[tokio::test]
async fn admin_stats_cover_the_whole_bank() {
    let bank = open_bank("1000.00").await;
    let admin = register(&bank, "admin").await;
    let a = register(&bank, "alice").await;
    let b = register(&bank, "bob").await;
    bank.engine()
        .transfer(TransferRequest::new(a.id, b.email.clone(), amt("250")))
        .await
        .unwrap();
    bank.engine()
        .transfer(TransferRequest::new(b.id, a.email.clone(), amt("0.50")))
        .await
        .unwrap();
    bank.set_account_active(admin.id, b.id, false).await.unwrap();

    let stats = bank.query().admin_stats(admin.id).await.unwrap();
    assert_eq!(stats.total_users, 3);
    assert_eq!(stats.active_users, 2);
    assert_eq!(stats.daily_transaction_count, 2);
    assert_eq!(stats.total_volume, amt("250.50"));

    assert!(matches!(
        bank.query().admin_stats(a.id).await,
        Err(LedgerError::Forbidden(_))
    ));
}
