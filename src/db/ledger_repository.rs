use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use sea_orm::{
    prelude::Decimal,
    sea_query::OnConflict,
    ActiveModelTrait,
    ColumnTrait,
    ConnectionTrait,
    DatabaseConnection,
    DatabaseTransaction,
    DbErr,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    QuerySelect,
    RuntimeErr,
    Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::db::entity::{
    internal_balance,
    internal_wallet,
    ledger_entry,
    user,
    user_wallet,
    withdraw_request,
};
use crate::enums::{ EntryType, WithdrawStatus };
use crate::error::{ AppError, Result };
use crate::ledger::amount::{ from_decimal, to_decimal };
use crate::ledger::{ transition_effect, BalanceState, LockEffect };
use crate::models::{
    payout_actor,
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
};
use crate::store::LedgerStore;

/// Whole-transaction attempts on serialization failure or deadlock.
const MAX_ATTEMPTS: u32 = 3;

/// Postgres-backed ledger store.
///
/// Balance mutations lock the wallet's `internal_balances` row with
/// `SELECT ... FOR UPDATE` and commit the ledger insert and the balance
/// update in one transaction. Withdraw transitions lock the request row
/// first, then the balance row; no path takes them in the other order.
#[derive(Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Re-run a whole transactional operation on transient conflicts.
    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut run: F) -> Result<T>
        where F: FnMut() -> Fut + Send, Fut: Future<Output = Result<T>> + Send, T: Send
    {
        let mut attempt = 1;
        loop {
            match run().await {
                Err(AppError::Database(err)) if attempt < MAX_ATTEMPTS && is_transient(&err) => {
                    tracing::warn!(operation, attempt, error = %err, "Transaction conflict, retrying");
                    tokio::time::sleep(Duration::from_millis(25 * (attempt as u64))).await;
                    attempt += 1;
                }
                other => {
                    return other;
                }
            }
        }
    }

    async fn wallet_owner<C: ConnectionTrait>(conn: &C, address: &str) -> Result<Option<user::Model>> {
        let link = user_wallet::Entity
            ::find_by_id(address.to_string())
            .find_also_related(user::Entity)
            .one(conn).await?;

        Ok(link.and_then(|(_, owner)| owner))
    }

    /// Insert an address link unless it exists; returns the owner afterwards.
    async fn insert_link(txn: &DatabaseTransaction, user_id: Uuid, address: &str) -> Result<Uuid> {
        let has_primary = user_wallet::Entity
            ::find()
            .filter(user_wallet::Column::UserId.eq(user_id))
            .filter(user_wallet::Column::IsPrimary.eq(true))
            .one(txn).await?
            .is_some();

        let link = user_wallet::ActiveModel {
            address: Set(address.to_string()),
            user_id: Set(user_id),
            is_primary: Set(!has_primary),
            created_at: Set(Utc::now()),
        };
        ignore_conflict(
            user_wallet::Entity
                ::insert(link)
                .on_conflict(OnConflict::column(user_wallet::Column::Address).do_nothing().to_owned())
                .exec_without_returning(txn).await
        )?;

        let link = user_wallet::Entity
            ::find_by_id(address.to_string())
            .one(txn).await?
            .ok_or_else(|| AppError::Internal(format!("wallet link for {} vanished", address)))?;

        Ok(link.user_id)
    }

    /// `None` means a concurrent registration won a race and the caller should re-run.
    async fn register_once(&self, input: &NewWalletUser) -> Result<Option<RegisteredUser>> {
        let txn = self.db.begin().await?;

        if let Some(owner) = Self::wallet_owner(&txn, &input.wallet_address).await? {
            txn.commit().await?;
            return Ok(
                Some(RegisteredUser {
                    user: owner.into(),
                    is_new_user: false,
                    linked_existing_account: false,
                })
            );
        }

        if let Some(email) = input.email.as_deref() {
            let existing = user::Entity
                ::find()
                .filter(user::Column::Email.eq(email))
                .one(&txn).await?;

            if let Some(existing) = existing {
                let owner = Self::insert_link(&txn, existing.id, &input.wallet_address).await?;
                if owner != existing.id {
                    txn.rollback().await?;
                    return Ok(None);
                }
                txn.commit().await?;
                return Ok(
                    Some(RegisteredUser {
                        user: existing.into(),
                        is_new_user: false,
                        linked_existing_account: true,
                    })
                );
            }
        }

        let user_id = Uuid::new_v4();
        let new_user = user::ActiveModel {
            id: Set(user_id),
            email: Set(input.email.clone()),
            name: Set(input.name.clone()),
            created_at: Set(Utc::now()),
        };
        let inserted = ignore_conflict(
            user::Entity
                ::insert(new_user)
                .on_conflict(OnConflict::column(user::Column::Email).do_nothing().to_owned())
                .exec_without_returning(&txn).await
        )?;
        if inserted == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let owner = Self::insert_link(&txn, user_id, &input.wallet_address).await?;
        if owner != user_id {
            txn.rollback().await?;
            return Ok(None);
        }

        let created = user::Entity
            ::find_by_id(user_id)
            .one(&txn).await?
            .ok_or(AppError::UserNotFound)?;
        txn.commit().await?;

        Ok(
            Some(RegisteredUser {
                user: created.into(),
                is_new_user: true,
                linked_existing_account: false,
            })
        )
    }

    async fn lock_balance(
        txn: &DatabaseTransaction,
        wallet_id: Uuid
    ) -> Result<internal_balance::Model> {
        internal_balance::Entity
            ::find_by_id(wallet_id)
            .lock_exclusive()
            .one(txn).await?
            .ok_or(AppError::WalletNotFound)
    }

    async fn write_balance(
        txn: &DatabaseTransaction,
        row: internal_balance::Model,
        state: BalanceState,
        now: DateTime<Utc>
    ) -> Result<internal_balance::Model> {
        let mut active: internal_balance::ActiveModel = row.into();
        active.balance = Set(to_decimal(state.balance)?);
        active.pending_onchain = Set(to_decimal(state.pending_onchain)?);
        active.locked_amount = Set(to_decimal(state.locked_amount)?);
        active.updated_at = Set(now);
        Ok(active.update(txn).await?)
    }

    async fn insert_entry(
        txn: &DatabaseTransaction,
        wallet_id: Uuid,
        entry_type: EntryType,
        signed_amount: i128,
        entry: NewLedgerEntry,
        now: DateTime<Utc>
    ) -> Result<ledger_entry::Model> {
        let row = ledger_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(wallet_id),
            entry_type: Set(entry_type.as_str().to_string()),
            amount: Set(to_decimal(signed_amount)?),
            token_symbol: Set(entry.token_symbol),
            reference: Set(entry.reference),
            metadata: Set(entry.metadata),
            created_by: Set(entry.created_by),
            created_at: Set(now),
        };
        Ok(row.insert(txn).await?)
    }

    async fn apply_entry_once(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation> {
        let txn = self.db.begin().await?;

        let row = Self::lock_balance(&txn, wallet_id).await?;
        let current = InternalBalance::try_from(row.clone())?;
        let (next, signed) = current.state().apply_entry(entry.entry_type, entry.amount)?;

        let now = Utc::now();
        let entry_row = Self::insert_entry(&txn, wallet_id, entry.entry_type, signed, entry, now).await?;
        let balance_row = Self::write_balance(&txn, row, next, now).await?;

        txn.commit().await?;

        Ok(LedgerMutation {
            entry: entry_row.try_into()?,
            balance: balance_row.try_into()?,
        })
    }

    async fn create_withdrawal_once(&self, request: NewWithdrawRequest) -> Result<WithdrawMutation> {
        let txn = self.db.begin().await?;

        let row = Self::lock_balance(&txn, request.wallet_id).await?;
        let current = InternalBalance::try_from(row.clone())?;
        let next = current.state().reserve(request.amount)?;

        let now = Utc::now();
        let record = withdraw_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            wallet_id: Set(request.wallet_id),
            user_id: Set(request.user_id),
            token_symbol: Set(request.token_symbol),
            amount: Set(to_decimal(request.amount)?),
            destination_address: Set(request.destination_address),
            status: Set(WithdrawStatus::Pending.as_str().to_string()),
            reviewer_id: Set(None),
            tx_hash: Set(None),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }.insert(&txn).await?;
        let balance_row = Self::write_balance(&txn, row, next, now).await?;

        txn.commit().await?;

        Ok(WithdrawMutation {
            request: record.try_into()?,
            balance: balance_row.try_into()?,
            payout: None,
        })
    }

    async fn transition_once(
        &self,
        request_id: Uuid,
        change: WithdrawTransition
    ) -> Result<WithdrawMutation> {
        let txn = self.db.begin().await?;

        let request_row = withdraw_request::Entity
            ::find_by_id(request_id)
            .lock_exclusive()
            .one(&txn).await?
            .ok_or(AppError::WithdrawNotFound)?;
        let request = WithdrawRequest::try_from(request_row.clone())?;
        if let Some(expected) = change.expected_from {
            if expected != request.status {
                return Err(AppError::InvalidStatusTransition {
                    from: request.status,
                    to: change.status,
                });
            }
        }
        let effect = transition_effect(request.status, change.status)?;

        let balance_row = Self::lock_balance(&txn, request.wallet_id).await?;
        let current = InternalBalance::try_from(balance_row.clone())?;
        let now = Utc::now();

        let (next, payout) = match effect {
            LockEffect::Keep => (current.state(), None),
            LockEffect::Release => (current.state().release(request.amount)?, None),
            LockEffect::Settle => {
                let (next, signed) = current.state().settle(request.amount)?;
                let entry = NewLedgerEntry {
                    entry_type: EntryType::Payout,
                    amount: request.amount,
                    token_symbol: request.token_symbol.clone(),
                    reference: Some(request.id.to_string()),
                    metadata: None,
                    created_by: Some(payout_actor(request.id)),
                };
                let row = Self::insert_entry(
                    &txn,
                    request.wallet_id,
                    EntryType::Payout,
                    signed,
                    entry,
                    now
                ).await?;
                (next, Some(LedgerEntry::try_from(row)?))
            }
        };

        let mut active: withdraw_request::ActiveModel = request_row.into();
        active.status = Set(change.status.as_str().to_string());
        active.updated_at = Set(now);
        if let Some(reviewer_id) = change.reviewer_id {
            active.reviewer_id = Set(Some(reviewer_id));
        }
        if let Some(tx_hash) = change.tx_hash {
            active.tx_hash = Set(Some(tx_hash));
        }
        if let Some(notes) = change.notes {
            active.notes = Set(Some(notes));
        }
        let updated = active.update(&txn).await?;
        let balance_row = Self::write_balance(&txn, balance_row, next, now).await?;

        txn.commit().await?;

        Ok(WithdrawMutation {
            request: updated.try_into()?,
            balance: balance_row.try_into()?,
            payout,
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn ping(&self) -> Result<()> {
        self.db.ping().await?;
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(user::Entity::find_by_id(user_id).one(&self.db).await?.map(Into::into))
    }

    async fn find_user_by_wallet(&self, address: &str) -> Result<Option<User>> {
        Ok(Self::wallet_owner(&self.db, address).await?.map(Into::into))
    }

    async fn register_wallet_user(&self, input: NewWalletUser) -> Result<RegisteredUser> {
        for _ in 0..MAX_ATTEMPTS {
            if let Some(registered) = self.retrying("register_wallet_user", || self.register_once(&input)).await? {
                return Ok(registered);
            }
        }

        Err(AppError::Internal(format!("registration of {} kept conflicting", input.wallet_address)))
    }

    async fn link_wallet(&self, user_id: Uuid, address: &str) -> Result<Uuid> {
        if self.find_user(user_id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }

        let txn = self.db.begin().await?;
        let owner = Self::insert_link(&txn, user_id, address).await?;
        txn.commit().await?;
        Ok(owner)
    }

    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<InternalWallet> {
        if
            let Some(wallet) = internal_wallet::Entity
                ::find()
                .filter(internal_wallet::Column::UserId.eq(user_id))
                .one(&self.db).await?
        {
            return Ok(wallet.into());
        }

        if self.find_user(user_id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let wallet = internal_wallet::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            wallet_address: Set(None),
            default_withdraw_address: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        ignore_conflict(
            internal_wallet::Entity
                ::insert(wallet)
                .on_conflict(
                    OnConflict::column(internal_wallet::Column::UserId).do_nothing().to_owned()
                )
                .exec_without_returning(&txn).await
        )?;

        // Whoever won the insert, read back the single row for this user.
        let wallet = internal_wallet::Entity
            ::find()
            .filter(internal_wallet::Column::UserId.eq(user_id))
            .one(&txn).await?
            .ok_or(AppError::WalletNotFound)?;

        let balance = internal_balance::ActiveModel {
            wallet_id: Set(wallet.id),
            balance: Set(Decimal::ZERO),
            pending_onchain: Set(Decimal::ZERO),
            locked_amount: Set(Decimal::ZERO),
            created_at: Set(now),
            updated_at: Set(now),
        };
        ignore_conflict(
            internal_balance::Entity
                ::insert(balance)
                .on_conflict(
                    OnConflict::column(internal_balance::Column::WalletId).do_nothing().to_owned()
                )
                .exec_without_returning(&txn).await
        )?;

        txn.commit().await?;

        tracing::info!(%user_id, wallet_id = %wallet.id, "Internal wallet ready");
        Ok(wallet.into())
    }

    async fn find_wallet(&self, wallet_id: Uuid) -> Result<Option<InternalWallet>> {
        Ok(internal_wallet::Entity::find_by_id(wallet_id).one(&self.db).await?.map(Into::into))
    }

    async fn set_wallet_address(&self, wallet_id: Uuid, address: &str) -> Result<InternalWallet> {
        let wallet = internal_wallet::Entity
            ::find_by_id(wallet_id)
            .one(&self.db).await?
            .ok_or(AppError::WalletNotFound)?;

        let mut active: internal_wallet::ActiveModel = wallet.into();
        active.wallet_address = Set(Some(address.to_string()));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?.into())
    }

    async fn set_default_withdraw_address(
        &self,
        wallet_id: Uuid,
        address: Option<&str>
    ) -> Result<InternalWallet> {
        let wallet = internal_wallet::Entity
            ::find_by_id(wallet_id)
            .one(&self.db).await?
            .ok_or(AppError::WalletNotFound)?;

        let mut active: internal_wallet::ActiveModel = wallet.into();
        active.default_withdraw_address = Set(address.map(str::to_string));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?.into())
    }

    async fn get_balance(&self, wallet_id: Uuid) -> Result<InternalBalance> {
        internal_balance::Entity
            ::find_by_id(wallet_id)
            .one(&self.db).await?
            .ok_or(AppError::WalletNotFound)?
            .try_into()
    }

    async fn recent_ledger(&self, wallet_id: Uuid, limit: u64) -> Result<Vec<LedgerEntry>> {
        ledger_entry::Entity
            ::find()
            .filter(ledger_entry::Column::WalletId.eq(wallet_id))
            .order_by_desc(ledger_entry::Column::CreatedAt)
            .limit(limit)
            .all(&self.db).await?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    async fn ledger_sum(&self, wallet_id: Uuid) -> Result<i128> {
        let total = ledger_entry::Entity
            ::find()
            .select_only()
            .column_as(ledger_entry::Column::Amount.sum(), "total")
            .filter(ledger_entry::Column::WalletId.eq(wallet_id))
            .into_tuple::<Option<Decimal>>()
            .one(&self.db).await?
            .flatten();

        total.map(from_decimal).unwrap_or(Ok(0))
    }

    async fn apply_entry(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation> {
        self.retrying("apply_entry", || self.apply_entry_once(wallet_id, entry.clone())).await
    }

    async fn create_withdrawal(&self, request: NewWithdrawRequest) -> Result<WithdrawMutation> {
        self.retrying("create_withdrawal", || self.create_withdrawal_once(request.clone())).await
    }

    async fn transition_withdrawal(
        &self,
        request_id: Uuid,
        change: WithdrawTransition
    ) -> Result<WithdrawMutation> {
        self.retrying("transition_withdrawal", || self.transition_once(request_id, change.clone())).await
    }

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawRequest>> {
        withdraw_request::Entity
            ::find_by_id(request_id)
            .one(&self.db).await?
            .map(WithdrawRequest::try_from)
            .transpose()
    }

    async fn list_withdrawals(
        &self,
        filter: &WithdrawFilter,
        limit: u64
    ) -> Result<Vec<WithdrawRequest>> {
        let mut query = withdraw_request::Entity::find();
        if let Some(user_id) = filter.user_id {
            query = query.filter(withdraw_request::Column::UserId.eq(user_id));
        }
        if let Some(wallet_id) = filter.wallet_id {
            query = query.filter(withdraw_request::Column::WalletId.eq(wallet_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(withdraw_request::Column::Status.eq(status.as_str()));
        }

        query
            .order_by_desc(withdraw_request::Column::CreatedAt)
            .limit(limit)
            .all(&self.db).await?
            .into_iter()
            .map(WithdrawRequest::try_from)
            .collect()
    }

    async fn withdraw_report(&self, limit: u64) -> Result<Vec<WithdrawReportRow>> {
        withdraw_request::Entity
            ::find()
            .find_also_related(internal_wallet::Entity)
            .order_by_desc(withdraw_request::Column::CreatedAt)
            .limit(limit)
            .all(&self.db).await?
            .into_iter()
            .map(|(request, wallet)| {
                Ok(WithdrawReportRow {
                    request: request.try_into()?,
                    wallet_address: wallet.and_then(|w| w.wallet_address),
                })
            })
            .collect()
    }

    async fn withdraw_volume_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i128> {
        let excluded: Vec<&str> = WithdrawStatus::excluded_from_volume()
            .iter()
            .map(|s| s.as_str())
            .collect();

        let total = withdraw_request::Entity
            ::find()
            .select_only()
            .column_as(withdraw_request::Column::Amount.sum(), "total")
            .filter(withdraw_request::Column::UserId.eq(user_id))
            .filter(withdraw_request::Column::CreatedAt.gte(since))
            .filter(withdraw_request::Column::Status.is_not_in(excluded))
            .into_tuple::<Option<Decimal>>()
            .one(&self.db).await?
            .flatten();

        total.map(from_decimal).unwrap_or(Ok(0))
    }
}

/// `ON CONFLICT DO NOTHING` reports "nothing inserted" as zero rows.
fn ignore_conflict(result: std::result::Result<u64, DbErr>) -> Result<u64> {
    match result {
        Ok(rows) => Ok(rows),
        Err(DbErr::RecordNotInserted) => Ok(0),
        Err(err) => Err(err.into()),
    }
}

/// Serialization failure (`40001`) or deadlock (`40P01`).
fn is_transient(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Exec(runtime) | DbErr::Query(runtime) => runtime,
        _ => {
            return false;
        }
    };

    match runtime {
        RuntimeErr::SqlxError(inner) =>
            inner
                .as_database_error()
                .and_then(|db_err| db_err.code())
                .map_or(false, |code| code == "40001" || code == "40P01"),
        _ => false,
    }
}
