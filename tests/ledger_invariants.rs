mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{ TestApp, DESTINATION, WALLET };
use internal_ledger::{
    enums::{ EntryType, WithdrawStatus },
    models::{ NewLedgerEntry, WithdrawFilter, WithdrawTransition },
    services::{ CreateWithdrawal, ResolvedIdentity, Session },
    store::LedgerStore,
    AppError,
};
use proptest::prelude::*;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Credit(i128),
    Debit(i128),
    Withdraw(i128),
    Complete(usize),
    Reject(usize),
    Cancel(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i128..1_000).prop_map(Op::Credit),
        (1i128..1_000).prop_map(Op::Debit),
        (1i128..1_000).prop_map(Op::Withdraw),
        (0usize..16).prop_map(Op::Complete),
        (0usize..16).prop_map(Op::Reject),
        (0usize..16).prop_map(Op::Cancel)
    ]
}

fn entry(entry_type: EntryType, amount: i128) -> NewLedgerEntry {
    NewLedgerEntry {
        entry_type,
        amount,
        token_symbol: "TKN".to_string(),
        reference: None,
        metadata: None,
        created_by: Some("proptest".to_string()),
    }
}

async fn registered(app: &TestApp) -> (ResolvedIdentity, Uuid) {
    app.state.identity_service.register_wallet(WALLET, None, None).await.unwrap();
    let identity = app.state.identity_service
        .resolve(&Session::default(), Some(WALLET)).await
        .unwrap();
    let wallet = app.state.balance_service
        .ensure_wallet(identity.user_id, identity.wallet_address.as_deref()).await
        .unwrap();
    (identity, wallet.id)
}

fn finish(status: WithdrawStatus) -> WithdrawTransition {
    WithdrawTransition { status, expected_from: None, reviewer_id: None, tx_hash: None, notes: None }
}

/// Business rejections are expected; anything else is a bug.
fn expect_business<T>(result: Result<T, AppError>) {
    match result {
        Ok(_) | Err(AppError::InsufficientFunds) | Err(AppError::InvalidStatusTransition { .. }) => {}
        Err(e) => panic!("unexpected error: {e}"),
    }
}

async fn run_ops(ops: Vec<Op>) {
    let app = TestApp::new();
    let (identity, wallet_id) = registered(&app).await;
    let withdrawals = &app.state.withdrawal_service;
    let mut requests: Vec<Uuid> = Vec::new();

    for op in ops {
        match op {
            Op::Credit(amount) => {
                expect_business(app.state.balance_service.credit(wallet_id, entry(EntryType::Credit, amount)).await);
            }
            Op::Debit(amount) => {
                expect_business(app.state.balance_service.debit(wallet_id, entry(EntryType::Debit, amount)).await);
            }
            Op::Withdraw(amount) => {
                let input = CreateWithdrawal {
                    amount: Some(format!("0.{:018}", amount)),
                    destination_address: Some(DESTINATION.to_string()),
                    note: None,
                };
                match withdrawals.create(&identity, input).await {
                    Ok(mutation) => requests.push(mutation.request.id),
                    Err(AppError::InsufficientFunds) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            Op::Complete(i) if !requests.is_empty() => {
                let id = requests[i % requests.len()];
                expect_business(withdrawals.transition(id, finish(WithdrawStatus::Completed)).await);
            }
            Op::Reject(i) if !requests.is_empty() => {
                let id = requests[i % requests.len()];
                expect_business(withdrawals.transition(id, finish(WithdrawStatus::Rejected)).await);
            }
            Op::Cancel(i) if !requests.is_empty() => {
                let id = requests[i % requests.len()];
                expect_business(withdrawals.cancel(&identity, id, None).await);
            }
            _ => {}
        }

        let balance = app.store.get_balance(wallet_id).await.unwrap();
        assert!(balance.balance >= 0);
        assert!(balance.locked_amount >= 0);
        let reconciliation = app.state.balance_service.reconcile(wallet_id).await.unwrap();
        assert!(reconciliation.is_consistent(), "{:?}", reconciliation);

        let pending: i128 = app.store
            .list_withdrawals(&WithdrawFilter::default(), 1_000).await
            .unwrap()
            .iter()
            .filter(|r| matches!(r.status, WithdrawStatus::Pending | WithdrawStatus::Approved))
            .map(|r| r.amount)
            .sum();
        assert_eq!(balance.locked_amount, pending);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_ledger_conserves_balance(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(run_ops(ops));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_creates_one_user() {
    let app = Arc::new(TestApp::new());

    let mut handles = Vec::new();
    for i in 0..10 {
        let app = app.clone();
        // Mixed case must resolve to the same link.
        let address = if i % 2 == 0 { WALLET.to_string() } else { WALLET.to_lowercase() };
        handles.push(
            tokio::spawn(async move {
                app.state.identity_service.register_wallet(&address, None, None).await
            })
        );
    }

    let mut users = HashSet::new();
    let mut created = 0;
    for handle in handles {
        let registered = handle.await.unwrap().unwrap();
        users.insert(registered.user.id);
        if registered.is_new_user {
            created += 1;
        }
    }

    assert_eq!(users.len(), 1);
    assert_eq!(created, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_wallet_creation_converges() {
    let app = Arc::new(TestApp::new());
    let registered = app.state.identity_service
        .register_wallet(WALLET, None, None).await
        .unwrap();
    let user_id = registered.user.id;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let app = app.clone();
        handles.push(tokio::spawn(async move { app.store.get_or_create_wallet(user_id).await }));
    }

    let mut wallets = HashSet::new();
    for handle in handles {
        wallets.insert(handle.await.unwrap().unwrap().id);
    }
    assert_eq!(wallets.len(), 1);

    let wallet_id = wallets.into_iter().next().unwrap();
    let balance = app.store.get_balance(wallet_id).await.unwrap();
    assert_eq!(balance.balance, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() {
    let app = Arc::new(TestApp::new());
    let (_, wallet_id) = registered(&app).await;
    app.state.balance_service.credit(wallet_id, entry(EntryType::Credit, 100)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let app = app.clone();
        handles.push(
            tokio::spawn(async move {
                app.state.balance_service.debit(wallet_id, entry(EntryType::Debit, 30)).await
            })
        );
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => {
                succeeded += 1;
            }
            Err(AppError::InsufficientFunds) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 3);
    let reconciliation = app.state.balance_service.reconcile(wallet_id).await.unwrap();
    assert_eq!(reconciliation.balance, 10);
    assert!(reconciliation.is_consistent());
}
