//! Storage seam for the ledger.
//!
//! Services never talk to a database handle directly; they receive an
//! `Arc<dyn LedgerStore>`. Production wires in the Postgres store from
//! `crate::db`; tests use [`MemoryLedgerStore`].
//!
//! Every balance-mutating method is atomic and serialized per wallet: the
//! implementation holds an exclusive lock on the wallet's balance row for the
//! whole read-modify-write, and the ledger insert commits with the balance
//! update or not at all. Mutations on different wallets never wait on each
//! other.

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
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

pub mod memory;

pub use memory::MemoryLedgerStore;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Cheap round trip used by the health check.
    async fn ping(&self) -> Result<()>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Owner of a normalized wallet address.
    async fn find_user_by_wallet(&self, address: &str) -> Result<Option<User>>;

    /// Idempotent wallet registration. Reuses the owner of the address, links
    /// the address to an existing user with the same email, or creates a user.
    async fn register_wallet_user(&self, input: NewWalletUser) -> Result<RegisteredUser>;

    /// Link an address to `user_id` unless someone already owns it.
    /// Returns the owner after the call.
    async fn link_wallet(&self, user_id: Uuid, address: &str) -> Result<Uuid>;

    /// One internal wallet (and its zeroed balance row) per user.
    async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<InternalWallet>;

    async fn find_wallet(&self, wallet_id: Uuid) -> Result<Option<InternalWallet>>;

    /// Refresh the cached on-chain address of an internal wallet.
    async fn set_wallet_address(&self, wallet_id: Uuid, address: &str) -> Result<InternalWallet>;

    /// `None` clears the preference.
    async fn set_default_withdraw_address(
        &self,
        wallet_id: Uuid,
        address: Option<&str>
    ) -> Result<InternalWallet>;

    async fn get_balance(&self, wallet_id: Uuid) -> Result<InternalBalance>;

    /// Most recent entries first.
    async fn recent_ledger(&self, wallet_id: Uuid, limit: u64) -> Result<Vec<LedgerEntry>>;

    /// Sum of every signed ledger amount for the wallet.
    async fn ledger_sum(&self, wallet_id: Uuid) -> Result<i128>;

    async fn apply_entry(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation>;

    /// Lock `amount` from the available balance and insert a `pending` request.
    async fn create_withdrawal(&self, request: NewWithdrawRequest) -> Result<WithdrawMutation>;

    async fn transition_withdrawal(
        &self,
        request_id: Uuid,
        change: WithdrawTransition
    ) -> Result<WithdrawMutation>;

    async fn find_withdrawal(&self, request_id: Uuid) -> Result<Option<WithdrawRequest>>;

    /// Newest first.
    async fn list_withdrawals(
        &self,
        filter: &WithdrawFilter,
        limit: u64
    ) -> Result<Vec<WithdrawRequest>>;

    async fn withdraw_report(&self, limit: u64) -> Result<Vec<WithdrawReportRow>>;

    /// Amount requested by the user since `since`, excluding rejected and
    /// cancelled requests.
    async fn withdraw_volume_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i128>;
}
