//! File-backed bank: state survives restarts and torn journal tails

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use bank_ledger::config::StorageMode;
use bank_ledger::{
    AccountId, Amount, AppConfig, Bank, NewAccount, TransactionStatus, TransferRequest,
};

fn file_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.mode = StorageMode::File;
    config.storage.data_dir = dir.to_path_buf();
    config.storage.sync_on_append = false;
    config.ledger.admin_emails = vec!["admin@bank.test".to_string()];
    config.auth.hash_memory_kib = 1024;
    config.auth.hash_iterations = 1;
    config
}

fn registration(name: &str) -> NewAccount {
    NewAccount {
        username: name.to_string(),
        email: format!("{}@bank.test", name),
        password: "password1".to_string(),
        full_name: name.to_string(),
        phone: "555-0100".to_string(),
    }
}

async fn cents(bank: &Bank, id: AccountId) -> u64 {
    bank.accounts()
        .get_by_id(id)
        .await
        .unwrap()
        .balance()
        .amount()
        .cents()
}

#[tokio::test]
async fn reopen_restores_the_full_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());

    let (admin, alice, bob, before) = {
        let bank = Bank::open(&config).await.unwrap();
        let admin = bank.accounts().create_account(registration("admin")).await.unwrap();
        let alice = bank.accounts().create_account(registration("alice")).await.unwrap();
        let bob = bank.accounts().create_account(registration("bob")).await.unwrap();

        bank.engine()
            .transfer(
                TransferRequest::new(alice.id, "bob@bank.test", Amount::from_cents(25_000))
                    .with_description("rent"),
            )
            .await
            .unwrap();
        bank.engine()
            .transfer(TransferRequest::new(bob.id, "alice@bank.test", Amount::from_cents(3_000)))
            .await
            .unwrap();
        bank.set_account_active(admin.id, bob.id, false).await.unwrap();

        let before = bank.ledger().list_all().await;
        (admin.id, alice.id, bob.id, before)
    };

    let bank = Bank::open(&config).await.unwrap();
    assert_eq!(cents(&bank, alice).await, 78_000);
    assert_eq!(cents(&bank, bob).await, 122_000);
    assert_eq!(bank.ledger().list_all().await, before);
    assert!(!bank.accounts().get_by_id(bob).await.unwrap().is_active);
    assert!(bank.accounts().get_by_id(admin).await.unwrap().is_admin);
    assert!(
        bank.accounts()
            .validate_credentials("alice@bank.test", "password1")
            .await
            .is_some()
    );
    assert_eq!(bank.query().summary(alice).await.unwrap().count, 2);
}

#[tokio::test]
async fn torn_journal_tail_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());

    let (alice, bob) = {
        let bank = Bank::open(&config).await.unwrap();
        let alice = bank.accounts().create_account(registration("alice")).await.unwrap();
        let bob = bank.accounts().create_account(registration("bob")).await.unwrap();
        bank.engine()
            .transfer(TransferRequest::new(alice.id, "bob@bank.test", Amount::from_cents(100)))
            .await
            .unwrap();
        (alice.id, bob.id)
    };

    // Half-written record from a crash mid-append
    let wal = dir.path().join("wal").join("current.wal");
    let mut file = OpenOptions::new().append(true).open(&wal).unwrap();
    file.write_all(&[0x5A; 33]).unwrap();
    drop(file);

    let bank = Bank::open(&config).await.unwrap();
    assert_eq!(cents(&bank, alice).await, 99_900);
    assert_eq!(cents(&bank, bob).await, 100_100);

    // The journal keeps working after the tail was dropped
    bank.engine()
        .transfer(TransferRequest::new(bob, "alice@bank.test", Amount::from_cents(100)))
        .await
        .unwrap();
    drop(bank);

    let bank = Bank::open(&config).await.unwrap();
    assert_eq!(cents(&bank, alice).await, 100_000);
    assert_eq!(bank.ledger().len().await, 2);
}

#[tokio::test]
async fn idempotency_keys_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());

    let (alice, first) = {
        let bank = Bank::open(&config).await.unwrap();
        let alice = bank.accounts().create_account(registration("alice")).await.unwrap();
        bank.accounts().create_account(registration("bob")).await.unwrap();
        let tx = bank
            .engine()
            .transfer(
                TransferRequest::new(alice.id, "bob@bank.test", Amount::from_cents(500))
                    .with_idempotency_key("order-17"),
            )
            .await
            .unwrap();
        (alice.id, tx)
    };

    let bank = Bank::open(&config).await.unwrap();
    let replay = bank
        .engine()
        .transfer(
            TransferRequest::new(alice, "bob@bank.test", Amount::from_cents(500))
                .with_idempotency_key("order-17"),
        )
        .await
        .unwrap();
    assert_eq!(replay.id, first.id);
    assert_eq!(replay.status, TransactionStatus::Completed);
    assert_eq!(cents(&bank, alice).await, 99_500);
    assert_eq!(bank.ledger().len().await, 1);
}

#[tokio::test]
async fn checkpoint_then_reopen_is_lossless() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());

    let bank = Bank::open(&config).await.unwrap();
    let alice = bank.accounts().create_account(registration("alice")).await.unwrap();
    bank.accounts().create_account(registration("bob")).await.unwrap();
    for _ in 0..5 {
        bank.engine()
            .transfer(TransferRequest::new(alice.id, "bob@bank.test", Amount::from_cents(1_000)))
            .await
            .unwrap();
    }
    bank.checkpoint().await.unwrap();
    let before = bank.ledger().export().await;
    drop(bank);

    let bank = Bank::open(&config).await.unwrap();
    assert_eq!(bank.ledger().export().await, before);
    assert_eq!(cents(&bank, alice.id).await, 95_000);
}
