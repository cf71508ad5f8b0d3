//! Wire shapes. Amounts travel as decimal strings of minor units and
//! timestamps as ISO-8601 UTC with millisecond precision.

use chrono::{ DateTime, SecondsFormat, Utc };
use serde::Serialize;
use uuid::Uuid;

use crate::ledger::format_display;
use crate::models::{ InternalBalance, InternalWallet, LedgerEntry, WithdrawRequest };
use crate::services::Snapshot;

/// Fraction digits always shown in formatted balances.
const DISPLAY_FRACTION_DIGITS: usize = 2;

pub fn iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_address: Option<String>,
    pub default_withdraw_address: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&InternalWallet> for WalletDto {
    fn from(wallet: &InternalWallet) -> Self {
        Self {
            id: wallet.id,
            user_id: wallet.user_id,
            wallet_address: wallet.wallet_address.clone(),
            default_withdraw_address: wallet.default_withdraw_address.clone(),
            created_at: iso(&wallet.created_at),
            updated_at: iso(&wallet.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDto {
    pub wallet_id: Uuid,
    pub balance: String,
    pub pending_onchain: String,
    pub locked_amount: String,
    pub available: String,
    pub balance_formatted: String,
    pub available_formatted: String,
    pub locked_formatted: String,
    pub pending_formatted: String,
    pub created_at: String,
    pub updated_at: String,
}

impl BalanceDto {
    pub fn new(balance: &InternalBalance, decimals: u32) -> Self {
        let display = |value: i128| format_display(value, decimals, DISPLAY_FRACTION_DIGITS);
        let available = balance.available();

        Self {
            wallet_id: balance.wallet_id,
            balance: balance.balance.to_string(),
            pending_onchain: balance.pending_onchain.to_string(),
            locked_amount: balance.locked_amount.to_string(),
            available: available.to_string(),
            balance_formatted: display(balance.balance),
            available_formatted: display(available),
            locked_formatted: display(balance.locked_amount),
            pending_formatted: display(balance.pending_onchain),
            created_at: iso(&balance.created_at),
            updated_at: iso(&balance.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryDto {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub entry_type: String,
    pub amount: String,
    pub token_symbol: String,
    pub reference: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<String>,
    pub created_at: String,
}

impl From<&LedgerEntry> for LedgerEntryDto {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id,
            wallet_id: entry.wallet_id,
            entry_type: entry.entry_type.to_string(),
            amount: entry.amount.to_string(),
            token_symbol: entry.token_symbol.clone(),
            reference: entry.reference.clone(),
            metadata: entry.metadata.clone(),
            created_by: entry.created_by.clone(),
            created_at: iso(&entry.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDto {
    pub token_symbol: String,
    pub decimals: u32,
    pub wallet: WalletDto,
    pub balance: BalanceDto,
    pub ledger: Vec<LedgerEntryDto>,
}

impl From<&Snapshot> for SnapshotDto {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            token_symbol: snapshot.token_symbol.clone(),
            decimals: snapshot.decimals,
            wallet: WalletDto::from(&snapshot.wallet),
            balance: BalanceDto::new(&snapshot.balance, snapshot.decimals),
            ledger: snapshot.ledger.iter().map(LedgerEntryDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequestDto {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub user_id: Option<Uuid>,
    pub token_symbol: String,
    pub amount: String,
    pub destination_address: String,
    pub status: String,
    pub reviewer_id: Option<String>,
    pub tx_hash: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&WithdrawRequest> for WithdrawRequestDto {
    fn from(request: &WithdrawRequest) -> Self {
        Self {
            id: request.id,
            wallet_id: request.wallet_id,
            user_id: request.user_id,
            token_symbol: request.token_symbol.clone(),
            amount: request.amount.to_string(),
            destination_address: request.destination_address.clone(),
            status: request.status.to_string(),
            reviewer_id: request.reviewer_id.clone(),
            tx_hash: request.tx_hash.clone(),
            notes: request.notes.clone(),
            created_at: iso(&request.created_at),
            updated_at: iso(&request.updated_at),
        }
    }
}
