use chrono::{ DateTime, Utc };
use uuid::Uuid;

use crate::enums::{ EntryType, WithdrawStatus };
use crate::ledger::BalanceState;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWalletUser {
    /// Normalized (lowercase) address.
    pub wallet_address: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisteredUser {
    pub user: User,
    pub is_new_user: bool,
    pub linked_existing_account: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternalWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_address: Option<String>,
    pub default_withdraw_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternalBalance {
    pub wallet_id: Uuid,
    pub balance: i128,
    pub pending_onchain: i128,
    pub locked_amount: i128,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InternalBalance {
    pub fn zero(wallet_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            wallet_id,
            balance: 0,
            pending_onchain: 0,
            locked_amount: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> BalanceState {
        BalanceState {
            balance: self.balance,
            pending_onchain: self.pending_onchain,
            locked_amount: self.locked_amount,
        }
    }

    /// Copy of this row carrying `state`, stamped at `now`.
    pub fn with_state(&self, state: BalanceState, now: DateTime<Utc>) -> Self {
        Self {
            balance: state.balance,
            pending_onchain: state.pending_onchain,
            locked_amount: state.locked_amount,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn available(&self) -> i128 {
        self.state().available()
    }
}

/// Immutable ledger row. `amount` is signed: inflows positive, outflows negative.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub entry_type: EntryType,
    pub amount: i128,
    pub token_symbol: String,
    pub reference: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to post one entry. `amount` is the positive magnitude.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub entry_type: EntryType,
    pub amount: i128,
    pub token_symbol: String,
    pub reference: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LedgerMutation {
    pub entry: LedgerEntry,
    pub balance: InternalBalance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawRequest {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Option<Uuid>,
    pub token_symbol: String,
    pub amount: i128,
    pub destination_address: String,
    pub status: WithdrawStatus,
    pub reviewer_id: Option<String>,
    pub tx_hash: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawRequest {
    pub wallet_id: Uuid,
    pub user_id: Option<Uuid>,
    pub token_symbol: String,
    pub amount: i128,
    pub destination_address: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WithdrawTransition {
    pub status: WithdrawStatus,
    /// Status the request must still be in when its row is locked.
    pub expected_from: Option<WithdrawStatus>,
    pub reviewer_id: Option<String>,
    pub tx_hash: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WithdrawMutation {
    pub request: WithdrawRequest,
    pub balance: InternalBalance,
    /// Payout entry posted when the request completed.
    pub payout: Option<LedgerEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct WithdrawFilter {
    pub user_id: Option<Uuid>,
    pub wallet_id: Option<Uuid>,
    pub status: Option<WithdrawStatus>,
}

impl WithdrawFilter {
    pub fn matches(&self, request: &WithdrawRequest) -> bool {
        self.user_id.map_or(true, |id| request.user_id == Some(id)) &&
            self.wallet_id.map_or(true, |id| request.wallet_id == id) &&
            self.status.map_or(true, |status| request.status == status)
    }
}

/// A withdraw request joined with its wallet's cached address.
#[derive(Debug, Clone)]
pub struct WithdrawReportRow {
    pub request: WithdrawRequest,
    pub wallet_address: Option<String>,
}

/// Ledger payout reference and actor tag for a withdraw request.
pub fn payout_actor(request_id: Uuid) -> String {
    format!("withdraw:{}", request_id)
}
