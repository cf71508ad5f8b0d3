use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard };

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use uuid::Uuid;

use crate::enums::{ EntryType, WithdrawStatus };
use crate::error::{ AppError, Result };
use crate::ledger::{ transition_effect, LockEffect };
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

use super::LedgerStore;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// address -> (owner, primary)
    wallet_links: HashMap<String, (Uuid, bool)>,
    wallets: HashMap<Uuid, InternalWallet>,
    wallet_by_user: HashMap<Uuid, Uuid>,
    balances: HashMap<Uuid, InternalBalance>,
    ledger: Vec<LedgerEntry>,
    withdrawals: Vec<WithdrawRequest>,
}

/// In-process store with the locking discipline of the Postgres one.
///
/// Table access goes through a short-lived `std` mutex that is never held
/// across an await. Balance mutations additionally take a per-wallet async
/// mutex (the stand-in for `SELECT ... FOR UPDATE`) for the whole
/// read-modify-write, and yield between the read and the write the way a
/// database round trip would.
#[derive(Default)]
pub struct MemoryLedgerStore {
    tables: Mutex<Tables>,
    wallet_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| AppError::Internal("memory store poisoned".to_string()))
    }

    fn wallet_lock(&self, wallet_id: Uuid) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self.wallet_locks
            .lock()
            .map_err(|_| AppError::Internal("memory store poisoned".to_string()))?;
        Ok(locks.entry(wallet_id).or_default().clone())
    }

    fn read_balance(&self, wallet_id: Uuid) -> Result<InternalBalance> {
        self.tables()?.balances.get(&wallet_id).cloned().ok_or(AppError::WalletNotFound)
    }

    /// Overwrite a wallet's balance row directly, bypassing the ledger.
    /// Used to model external tampering and pending on-chain amounts in tests.
    pub fn overwrite_balance(&self, balance: InternalBalance) -> Result<()> {
        self.tables()?.balances.insert(balance.wallet_id, balance);
        Ok(())
    }

    /// Whether `user_id` already has an internal wallet row.
    pub fn has_wallet(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.tables()?.wallet_by_user.contains_key(&user_id))
    }

    fn create_user(tables: &mut Tables, email: Option<String>, name: Option<String>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email,
            name,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        user
    }

    fn insert_link(tables: &mut Tables, user_id: Uuid, address: &str) -> Uuid {
        if let Some((owner, _)) = tables.wallet_links.get(address) {
            return *owner;
        }
        let primary = !tables.wallet_links.values().any(|(owner, _)| *owner == user_id);
        tables.wallet_links.insert(address.to_string(), (user_id, primary));
        user_id
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn ping(&self) -> Result<()> {
        self.tables().map(|_| ())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_wallet(&self, address: &str) -> Result<Option<User>> {
        let tables = self.tables()?;
        Ok(
            tables.wallet_links
                .get(address)
                .and_then(|(owner, _)| tables.users.get(owner))
                .cloned()
        )
    }

    async fn register_wallet_user(&self, input: NewWalletUser) -> Result<RegisteredUser> {
        let mut tables = self.tables()?;

        if let Some((owner, _)) = tables.wallet_links.get(&input.wallet_address).copied() {
            let user = tables.users.get(&owner).cloned().ok_or(AppError::UserNotFound)?;
            return Ok(RegisteredUser { user, is_new_user: false, linked_existing_account: false });
        }

        if let Some(email) = input.email.as_deref() {
            let existing = tables.users
                .values()
                .find(|u| u.email.as_deref() == Some(email))
                .cloned();
            if let Some(user) = existing {
                Self::insert_link(&mut tables, user.id, &input.wallet_address);
                return Ok(RegisteredUser { user, is_new_user: false, linked_existing_account: true });
            }
        }

        let user = Self::create_user(&mut tables, input.email, input.name);
        Self::insert_link(&mut tables, user.id, &input.wallet_address);
        Ok(RegisteredUser { user, is_new_user: true, linked_existing_account: false })
    }

    async fn link_wallet(&self, user_id: Uuid, address: &str) -> Result<Uuid> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::UserNotFound);
        }
        Ok(Self::insert_link(&mut tables, user_id, address))
    }

    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<InternalWallet> {
        let mut tables = self.tables()?;

        if let Some(wallet_id) = tables.wallet_by_user.get(&user_id).copied() {
            return tables.wallets.get(&wallet_id).cloned().ok_or(AppError::WalletNotFound);
        }
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::UserNotFound);
        }

        let now = Utc::now();
        let wallet = InternalWallet {
            id: Uuid::new_v4(),
            user_id,
            wallet_address: None,
            default_withdraw_address: None,
            created_at: now,
            updated_at: now,
        };
        tables.wallet_by_user.insert(user_id, wallet.id);
        tables.balances.insert(wallet.id, InternalBalance::zero(wallet.id, now));
        tables.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn find_wallet(&self, wallet_id: Uuid) -> Result<Option<InternalWallet>> {
        Ok(self.tables()?.wallets.get(&wallet_id).cloned())
    }

    async fn set_wallet_address(&self, wallet_id: Uuid, address: &str) -> Result<InternalWallet> {
        let mut tables = self.tables()?;
        let wallet = tables.wallets.get_mut(&wallet_id).ok_or(AppError::WalletNotFound)?;
        wallet.wallet_address = Some(address.to_string());
        wallet.updated_at = Utc::now();
        Ok(wallet.clone())
    }

    async fn set_default_withdraw_address(
        &self,
        wallet_id: Uuid,
        address: Option<&str>
    ) -> Result<InternalWallet> {
        let mut tables = self.tables()?;
        let wallet = tables.wallets.get_mut(&wallet_id).ok_or(AppError::WalletNotFound)?;
        wallet.default_withdraw_address = address.map(str::to_string);
        wallet.updated_at = Utc::now();
        Ok(wallet.clone())
    }

    async fn get_balance(&self, wallet_id: Uuid) -> Result<InternalBalance> {
        self.read_balance(wallet_id)
    }

    async fn recent_ledger(&self, wallet_id: Uuid, limit: u64) -> Result<Vec<LedgerEntry>> {
        Ok(
            self
                .tables()?
                .ledger.iter()
                .rev()
                .filter(|e| e.wallet_id == wallet_id)
                .take(limit as usize)
                .cloned()
                .collect()
        )
    }

    async fn ledger_sum(&self, wallet_id: Uuid) -> Result<i128> {
        Ok(
            self
                .tables()?
                .ledger.iter()
                .filter(|e| e.wallet_id == wallet_id)
                .map(|e| e.amount)
                .sum()
        )
    }

    async fn apply_entry(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation> {
        let lock = self.wallet_lock(wallet_id)?;
        let _guard = lock.lock().await;

        let current = self.read_balance(wallet_id)?;
        tokio::task::yield_now().await;

        let (next, signed) = current.state().apply_entry(entry.entry_type, entry.amount)?;
        let now = Utc::now();
        let ledger_entry = LedgerEntry {
            id: Uuid::new_v4(),
            wallet_id,
            entry_type: entry.entry_type,
            amount: signed,
            token_symbol: entry.token_symbol,
            reference: entry.reference,
            metadata: entry.metadata,
            created_by: entry.created_by,
            created_at: now,
        };
        let balance = current.with_state(next, now);

        let mut tables = self.tables()?;
        tables.ledger.push(ledger_entry.clone());
        tables.balances.insert(wallet_id, balance.clone());

        Ok(LedgerMutation { entry: ledger_entry, balance })
    }

    async fn create_withdrawal(&self, request: NewWithdrawRequest) -> Result<WithdrawMutation> {
        let lock = self.wallet_lock(request.wallet_id)?;
        let _guard = lock.lock().await;

        let current = self.read_balance(request.wallet_id)?;
        tokio::task::yield_now().await;

        let next = current.state().reserve(request.amount)?;
        let now = Utc::now();
        let record = WithdrawRequest {
            id: Uuid::new_v4(),
            wallet_id: request.wallet_id,
            user_id: request.user_id,
            token_symbol: request.token_symbol,
            amount: request.amount,
            destination_address: request.destination_address,
            status: WithdrawStatus::Pending,
            reviewer_id: None,
            tx_hash: None,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };
        let balance = current.with_state(next, now);

        let mut tables = self.tables()?;
        tables.withdrawals.push(record.clone());
        tables.balances.insert(record.wallet_id, balance.clone());

        Ok(WithdrawMutation { request: record, balance, payout: None })
    }

    async fn transition_withdrawal(
        &self,
        request_id: Uuid,
        change: WithdrawTransition
    ) -> Result<WithdrawMutation> {
        let wallet_id = self
            .find_withdrawal(request_id).await?
            .ok_or(AppError::WithdrawNotFound)?.wallet_id;

        let lock = self.wallet_lock(wallet_id)?;
        let _guard = lock.lock().await;

        // Re-read under the lock; the status may have moved while we waited.
        let request = self.find_withdrawal(request_id).await?.ok_or(AppError::WithdrawNotFound)?;
        check_expected(&request, &change)?;
        let current = self.read_balance(wallet_id)?;
        tokio::task::yield_now().await;

        let now = Utc::now();
        let (next, payout) = match transition_effect(request.status, change.status)? {
            LockEffect::Keep => (current.state(), None),
            LockEffect::Release => (current.state().release(request.amount)?, None),
            LockEffect::Settle => {
                let (next, signed) = current.state().settle(request.amount)?;
                let entry = LedgerEntry {
                    id: Uuid::new_v4(),
                    wallet_id,
                    entry_type: EntryType::Payout,
                    amount: signed,
                    token_symbol: request.token_symbol.clone(),
                    reference: Some(request.id.to_string()),
                    metadata: None,
                    created_by: Some(payout_actor(request.id)),
                    created_at: now,
                };
                (next, Some(entry))
            }
        };

        let mut updated = request;
        updated.status = change.status;
        updated.updated_at = now;
        if change.reviewer_id.is_some() {
            updated.reviewer_id = change.reviewer_id;
        }
        if change.tx_hash.is_some() {
            updated.tx_hash = change.tx_hash;
        }
        if change.notes.is_some() {
            updated.notes = change.notes;
        }
        let balance = current.with_state(next, now);

        let mut tables = self.tables()?;
        if let Some(entry) = &payout {
            tables.ledger.push(entry.clone());
        }
        if let Some(slot) = tables.withdrawals.iter_mut().find(|r| r.id == request_id) {
            *slot = updated.clone();
        }
        tables.balances.insert(wallet_id, balance.clone());

        Ok(WithdrawMutation { request: updated, balance, payout })
    }

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawRequest>> {
        Ok(
            self
                .tables()?
                .withdrawals.iter()
                .find(|r| r.id == request_id)
                .cloned()
        )
    }

    async fn list_withdrawals(
        &self,
        filter: &WithdrawFilter,
        limit: u64
    ) -> Result<Vec<WithdrawRequest>> {
        Ok(
            self
                .tables()?
                .withdrawals.iter()
                .rev()
                .filter(|r| filter.matches(r))
                .take(limit as usize)
                .cloned()
                .collect()
        )
    }

    async fn withdraw_report(&self, limit: u64) -> Result<Vec<WithdrawReportRow>> {
        let tables = self.tables()?;
        Ok(
            tables.withdrawals
                .iter()
                .rev()
                .take(limit as usize)
                .map(|request| WithdrawReportRow {
                    wallet_address: tables.wallets
                        .get(&request.wallet_id)
                        .and_then(|w| w.wallet_address.clone()),
                    request: request.clone(),
                })
                .collect()
        )
    }

    async fn withdraw_volume_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i128> {
        Ok(
            self
                .tables()?
                .withdrawals.iter()
                .filter(|r| r.user_id == Some(user_id))
                .filter(|r| r.created_at >= since && r.status.counts_toward_volume())
                .map(|r| r.amount)
                .sum()
        )
    }
}

fn check_expected(request: &WithdrawRequest, change: &WithdrawTransition) -> Result<()> {
    match change.expected_from {
        Some(expected) if expected != request.status => {
            Err(AppError::InvalidStatusTransition { from: request.status, to: change.status })
        }
        _ => Ok(()),
    }
}
