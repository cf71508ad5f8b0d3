mod common;

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use common::{ tokens, with_blocklist, test_config, TestApp, DESTINATION, WALLET };
use internal_ledger::{
    api::dto::BalanceDto,
    config::{ TokenConfig, WithdrawPolicy },
    enums::{ EntryType, WithdrawStatus },
    models::{
        InternalBalance,
        InternalWallet,
        LedgerEntry,
        LedgerMutation,
        NewLedgerEntry,
        NewWalletUser,
        NewWithdrawRequest,
        RegisteredUser,
        User,
        WithdrawFilter,
        WithdrawMutation,
        WithdrawReportRow,
        WithdrawRequest,
        WithdrawTransition,
    },
    notify::NotificationDispatcher,
    services::{
        AdminAdjustment,
        BalanceService,
        CreateWithdrawal,
        ResolvedIdentity,
        Session,
        WithdrawalService,
    },
    store::{ LedgerStore, MemoryLedgerStore },
    AppError,
    Result,
};
use uuid::Uuid;

async fn register(app: &TestApp) -> ResolvedIdentity {
    app.state.identity_service.register_wallet(WALLET, None, None).await.unwrap();
    app.state.identity_service.resolve(&Session::default(), Some(WALLET)).await.unwrap()
}

async fn credit(app: &TestApp, amount: &str) {
    app.state.admin_service
        .credit(AdminAdjustment {
            wallet_address: Some(WALLET.to_string()),
            amount: Some(amount.to_string()),
            reference: Some("manual top-up".to_string()),
            ..Default::default()
        }).await
        .unwrap();
}

fn withdrawal(amount: &str) -> CreateWithdrawal {
    CreateWithdrawal {
        amount: Some(amount.to_string()),
        destination_address: Some(DESTINATION.to_string()),
        note: None,
    }
}

fn transition(status: WithdrawStatus) -> WithdrawTransition {
    WithdrawTransition {
        status,
        expected_from: None,
        reviewer_id: Some("ops".to_string()),
        tx_hash: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let app = TestApp::new();
    let identity = register(&app).await;

    // New wallet starts empty.
    let snapshot = app.state.balance_service.snapshot(&identity).await.unwrap();
    assert_eq!(snapshot.balance.balance, 0);
    assert!(snapshot.ledger.is_empty());

    // Admin top-up.
    credit(&app, "100.00").await;
    let snapshot = app.state.balance_service.snapshot(&identity).await.unwrap();
    assert_eq!(snapshot.balance.balance, tokens(100));
    assert_eq!(snapshot.ledger.len(), 1);
    assert_eq!(snapshot.ledger[0].entry_type, EntryType::Credit);
    assert_eq!(snapshot.ledger[0].amount, tokens(100));
    assert_eq!(snapshot.ledger[0].reference.as_deref(), Some("manual top-up"));

    // Withdrawal locks funds without touching the balance.
    let created = app.state.withdrawal_service.create(&identity, withdrawal("40.00")).await.unwrap();
    assert_eq!(created.request.status, WithdrawStatus::Pending);
    assert_eq!(created.balance.balance, tokens(100));
    assert_eq!(created.balance.locked_amount, tokens(40));
    assert_eq!(BalanceDto::new(&created.balance, 18).available_formatted, "60.00");

    // Only 60 available.
    let err = app.state.withdrawal_service.create(&identity, withdrawal("65.00")).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds));

    // Admin debit checks the raw balance, not the lock.
    let debit = app.state.admin_service
        .debit(AdminAdjustment {
            wallet_address: Some(WALLET.to_string()),
            amount: Some("10.00".to_string()),
            ..Default::default()
        }).await
        .unwrap();
    assert_eq!(debit.snapshot.balance.balance, tokens(90));
    assert_eq!(debit.snapshot.balance.locked_amount, tokens(40));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_withdrawals_do_not_overcommit() {
    let app = Arc::new(TestApp::new());
    let identity = register(&app).await;
    credit(&app, "60").await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let identity = identity.clone();
        handles.push(
            tokio::spawn(async move {
                app.state.withdrawal_service.create(&identity, withdrawal("60")).await
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
    assert_eq!(succeeded, 1);

    let snapshot = app.state.balance_service.snapshot(&identity).await.unwrap();
    assert_eq!(snapshot.balance.locked_amount, tokens(60));
    assert_eq!(snapshot.balance.available(), 0);
}

#[tokio::test]
async fn test_exact_available_boundary() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "1").await;

    let over = CreateWithdrawal {
        amount: Some("1.000000000000000001".to_string()),
        ..withdrawal("0")
    };
    let err = app.state.withdrawal_service.create(&identity, over).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds));

    app.state.withdrawal_service.create(&identity, withdrawal("1")).await.unwrap();
}

#[tokio::test]
async fn test_zero_and_missing_amounts_rejected() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "1").await;

    let err = app.state.withdrawal_service.create(&identity, withdrawal("0")).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let missing = CreateWithdrawal { amount: None, ..withdrawal("1") };
    let err = app.state.withdrawal_service.create(&identity, missing).await.unwrap_err();
    assert!(matches!(err, AppError::AmountRequired));

    let err = app.state.withdrawal_service.create(&identity, withdrawal("1,5")).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmountFormat));
}

#[tokio::test]
async fn test_blocklist_is_case_insensitive_and_covers_own_wallet() {
    const BLOCKED: &str = "0xdeadbeef00000000000000000000000000000000";
    let app = TestApp::with_config(with_blocklist(test_config(), &[BLOCKED, WALLET]));
    let identity = register(&app).await;
    credit(&app, "10").await;

    let mixed_case = CreateWithdrawal {
        destination_address: Some("0xDeAdBeEf00000000000000000000000000000000".to_string()),
        ..withdrawal("1")
    };
    let err = app.state.withdrawal_service.create(&identity, mixed_case).await.unwrap_err();
    assert!(matches!(err, AppError::DestinationBlocked));

    // An empty destination falls back to the caller's wallet, which is blocked too.
    let own = CreateWithdrawal { destination_address: None, ..withdrawal("1") };
    let err = app.state.withdrawal_service.create(&identity, own).await.unwrap_err();
    assert!(matches!(err, AppError::DestinationBlocked));

    let snapshot = app.state.balance_service.snapshot(&identity).await.unwrap();
    assert_eq!(snapshot.balance.locked_amount, 0);
}

#[tokio::test]
async fn test_destination_validation() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "10").await;

    let bad = CreateWithdrawal {
        destination_address: Some("0x1234".to_string()),
        ..withdrawal("1")
    };
    let err = app.state.withdrawal_service.create(&identity, bad).await.unwrap_err();
    assert!(matches!(err, AppError::DestinationInvalid));

    let fallback = CreateWithdrawal { destination_address: None, ..withdrawal("1") };
    let created = app.state.withdrawal_service.create(&identity, fallback).await.unwrap();
    assert_eq!(created.request.destination_address, WALLET.to_lowercase());
}

#[tokio::test]
async fn test_daily_and_monthly_limits() {
    let mut config = test_config();
    config.withdraw.daily_limit = Some(tokens(5));
    config.withdraw.monthly_limit = Some(tokens(8));
    let app = TestApp::with_config(config);
    let identity = register(&app).await;
    credit(&app, "100").await;

    app.state.withdrawal_service.create(&identity, withdrawal("5")).await.unwrap();
    let err = app.state.withdrawal_service.create(&identity, withdrawal("1")).await.unwrap_err();
    assert!(matches!(err, AppError::LimitDailyExceeded));

    // Rejected requests stop counting toward the window.
    let first = app.state.withdrawal_service.list(&identity).await.unwrap().remove(0);
    app.state.withdrawal_service.transition(first.id, transition(WithdrawStatus::Rejected)).await.unwrap();
    app.state.withdrawal_service.create(&identity, withdrawal("4")).await.unwrap();

    let mut config = test_config();
    config.withdraw.monthly_limit = Some(tokens(3));
    let app = TestApp::with_config(config);
    let identity = register(&app).await;
    credit(&app, "100").await;
    let err = app.state.withdrawal_service.create(&identity, withdrawal("4")).await.unwrap_err();
    assert!(matches!(err, AppError::LimitMonthlyExceeded));
}

#[tokio::test]
async fn test_completion_posts_payout_and_keeps_conservation() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "100").await;

    let created = app.state.withdrawal_service.create(&identity, withdrawal("40")).await.unwrap();
    let id = created.request.id;

    app.state.withdrawal_service.transition(id, transition(WithdrawStatus::Approved)).await.unwrap();
    let completed = app.state.withdrawal_service
        .transition(id, WithdrawTransition {
            tx_hash: Some("0xfeed".to_string()),
            ..transition(WithdrawStatus::Completed)
        }).await
        .unwrap();

    assert_eq!(completed.balance.balance, tokens(60));
    assert_eq!(completed.balance.locked_amount, 0);
    let payout = completed.payout.unwrap();
    assert_eq!(payout.entry_type, EntryType::Payout);
    assert_eq!(payout.amount, -tokens(40));
    assert_eq!(payout.reference, Some(id.to_string()));
    assert_eq!(payout.created_by, Some(format!("withdraw:{}", id)));
    assert_eq!(completed.request.tx_hash.as_deref(), Some("0xfeed"));

    let wallet_id = completed.balance.wallet_id;
    assert!(app.state.balance_service.reconcile(wallet_id).await.unwrap().is_consistent());

    // Terminal states are final.
    let err = app.state.withdrawal_service
        .transition(id, transition(WithdrawStatus::Cancelled)).await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition { .. }));
}

#[tokio::test]
async fn test_rejection_releases_lock_only() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "100").await;

    let created = app.state.withdrawal_service.create(&identity, withdrawal("40")).await.unwrap();
    let rejected = app.state.withdrawal_service
        .transition(created.request.id, transition(WithdrawStatus::Rejected)).await
        .unwrap();

    assert_eq!(rejected.balance.balance, tokens(100));
    assert_eq!(rejected.balance.locked_amount, 0);
    assert!(rejected.payout.is_none());
}

#[tokio::test]
async fn test_owner_cancellation() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "100").await;
    let created = app.state.withdrawal_service.create(&identity, withdrawal("40")).await.unwrap();

    let stranger = app.state.identity_service
        .register_wallet(DESTINATION, None, None).await
        .unwrap();
    let stranger = ResolvedIdentity { user_id: stranger.user.id, wallet_address: None };
    let err = app.state.withdrawal_service
        .cancel(&stranger, created.request.id, None).await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let cancelled = app.state.withdrawal_service
        .cancel(&identity, created.request.id, Some("changed my mind".to_string())).await
        .unwrap();
    assert_eq!(cancelled.request.status, WithdrawStatus::Cancelled);
    assert_eq!(cancelled.balance.locked_amount, 0);
    assert_eq!(cancelled.request.notes.as_deref(), Some("changed my mind"));
}

/// Approves a request right after handing out its current state, so the
/// caller acts on a read that is already stale.
struct ApproveAfterRead {
    inner: Arc<MemoryLedgerStore>,
    armed: AtomicBool,
}

#[async_trait]
impl LedgerStore for ApproveAfterRead {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn find_user_by_wallet(&self, address: &str) -> Result<Option<User>> {
        self.inner.find_user_by_wallet(address).await
    }

    async fn register_wallet_user(&self, input: NewWalletUser) -> Result<RegisteredUser> {
        self.inner.register_wallet_user(input).await
    }

    async fn link_wallet(&self, user_id: Uuid, address: &str) -> Result<Uuid> {
        self.inner.link_wallet(user_id, address).await
    }

    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<InternalWallet> {
        self.inner.get_or_create_wallet(user_id).await
    }

    async fn find_wallet(&self, wallet_id: Uuid) -> Result<Option<InternalWallet>> {
        self.inner.find_wallet(wallet_id).await
    }

    async fn set_wallet_address(&self, wallet_id: Uuid, address: &str) -> Result<InternalWallet> {
        self.inner.set_wallet_address(wallet_id, address).await
    }

    async fn set_default_withdraw_address(
        &self,
        wallet_id: Uuid,
        address: Option<&str>
    ) -> Result<InternalWallet> {
        self.inner.set_default_withdraw_address(wallet_id, address).await
    }

    async fn get_balance(&self, wallet_id: Uuid) -> Result<InternalBalance> {
        self.inner.get_balance(wallet_id).await
    }

    async fn recent_ledger(&self, wallet_id: Uuid, limit: u64) -> Result<Vec<LedgerEntry>> {
        self.inner.recent_ledger(wallet_id, limit).await
    }

    async fn ledger_sum(&self, wallet_id: Uuid) -> Result<i128> {
        self.inner.ledger_sum(wallet_id).await
    }

    async fn apply_entry(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation> {
        self.inner.apply_entry(wallet_id, entry).await
    }

    async fn create_withdrawal(&self, request: NewWithdrawRequest) -> Result<WithdrawMutation> {
        self.inner.create_withdrawal(request).await
    }

    async fn transition_withdrawal(
        &self,
        request_id: Uuid,
        change: WithdrawTransition
    ) -> Result<WithdrawMutation> {
        self.inner.transition_withdrawal(request_id, change).await
    }

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawRequest>> {
        let seen = self.inner.find_withdrawal(request_id).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.inner.transition_withdrawal(request_id, transition(WithdrawStatus::Approved)).await?;
        }
        Ok(seen)
    }

    async fn list_withdrawals(
        &self,
        filter: &WithdrawFilter,
        limit: u64
    ) -> Result<Vec<WithdrawRequest>> {
        self.inner.list_withdrawals(filter, limit).await
    }

    async fn withdraw_report(&self, limit: u64) -> Result<Vec<WithdrawReportRow>> {
        self.inner.withdraw_report(limit).await
    }

    async fn withdraw_volume_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i128> {
        self.inner.withdraw_volume_since(user_id, since).await
    }
}

#[tokio::test]
async fn test_cancel_loses_to_concurrent_approval() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "100").await;
    let created = app.state.withdrawal_service.create(&identity, withdrawal("40")).await.unwrap();

    let racing = Arc::new(ApproveAfterRead {
        inner: app.store.clone(),
        armed: AtomicBool::new(true),
    });
    let store: Arc<dyn LedgerStore> = racing.clone();
    let balances = Arc::new(BalanceService::new(store.clone(), TokenConfig::default(), 50));
    let withdrawals = WithdrawalService::new(
        store,
        balances,
        WithdrawPolicy::default(),
        NotificationDispatcher::disabled()
    );

    let err = withdrawals.cancel(&identity, created.request.id, None).await.unwrap_err();
    assert!(
        matches!(err, AppError::InvalidStatusTransition {
            from: WithdrawStatus::Approved,
            to: WithdrawStatus::Cancelled,
        })
    );

    let request = app.store.find_withdrawal(created.request.id).await.unwrap().unwrap();
    assert_eq!(request.status, WithdrawStatus::Approved);
    let balance = app.store.get_balance(request.wallet_id).await.unwrap();
    assert_eq!(balance.locked_amount, tokens(40));
    assert_eq!(balance.balance, tokens(100));
}

#[tokio::test]
async fn test_expected_status_checked_at_write() {
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "100").await;
    let created = app.state.withdrawal_service.create(&identity, withdrawal("40")).await.unwrap();
    app.state.withdrawal_service
        .transition(created.request.id, transition(WithdrawStatus::Approved)).await
        .unwrap();

    let guarded = WithdrawTransition {
        expected_from: Some(WithdrawStatus::Pending),
        ..transition(WithdrawStatus::Rejected)
    };
    let err = app.store.transition_withdrawal(created.request.id, guarded).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition { from: WithdrawStatus::Approved, .. }));

    // Admin moves carry no expectation and still apply.
    let rejected = app.state.withdrawal_service
        .transition(created.request.id, transition(WithdrawStatus::Rejected)).await
        .unwrap();
    assert_eq!(rejected.request.status, WithdrawStatus::Rejected);
    assert_eq!(rejected.balance.locked_amount, 0);
}

#[tokio::test]
async fn test_rejected_destination_creates_no_wallet() {
    const BLOCKED: &str = "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
    let app = TestApp::with_config(with_blocklist(test_config(), &[BLOCKED]));
    let identity = register(&app).await;
    assert!(!app.store.has_wallet(identity.user_id).unwrap());

    let malformed = CreateWithdrawal {
        destination_address: Some("0x1234".to_string()),
        ..withdrawal("1")
    };
    let err = app.state.withdrawal_service.create(&identity, malformed).await.unwrap_err();
    assert!(matches!(err, AppError::DestinationInvalid));
    assert!(!app.store.has_wallet(identity.user_id).unwrap());

    let blocked = CreateWithdrawal {
        destination_address: Some(BLOCKED.to_uppercase().replace("0X", "0x")),
        ..withdrawal("1")
    };
    let err = app.state.withdrawal_service.create(&identity, blocked).await.unwrap_err();
    assert!(matches!(err, AppError::DestinationBlocked));
    assert!(!app.store.has_wallet(identity.user_id).unwrap());
}

#[tokio::test]
async fn test_default_withdraw_address_used_as_fallback() {
    const PREFERRED: &str = "0x2222222222222222222222222222222222222222";
    let app = TestApp::new();
    let identity = register(&app).await;
    credit(&app, "100").await;

    let wallet = app.state.balance_service
        .set_default_withdraw_address(&identity, Some(PREFERRED)).await
        .unwrap();
    assert_eq!(wallet.default_withdraw_address.as_deref(), Some(PREFERRED));

    let implicit = CreateWithdrawal {
        destination_address: None,
        ..withdrawal("10")
    };
    let created = app.state.withdrawal_service.create(&identity, implicit.clone()).await.unwrap();
    assert_eq!(created.request.destination_address, PREFERRED);

    // An explicit destination still wins.
    let explicit = app.state.withdrawal_service.create(&identity, withdrawal("10")).await.unwrap();
    assert_eq!(explicit.request.destination_address, DESTINATION);

    // Cleared preference falls back to the session wallet.
    app.state.balance_service.set_default_withdraw_address(&identity, None).await.unwrap();
    let created = app.state.withdrawal_service.create(&identity, implicit).await.unwrap();
    assert_eq!(created.request.destination_address, WALLET.to_lowercase());
}
