use std::sync::Arc;

use uuid::Uuid;

use crate::enums::EntryType;
use crate::error::{ AppError, Result };
use crate::ledger::amount::{ ensure_positive, parse_minor, parse_units };
use crate::models::{ LedgerEntry, NewLedgerEntry };
use crate::services::balance_service::{ BalanceService, Snapshot };
use crate::services::identity_service::IdentityService;

const DEFAULT_ACTOR: &str = "system";

/// Back-office balance adjustment.
#[derive(Debug, Clone, Default)]
pub struct AdminAdjustment {
    pub user_id: Option<Uuid>,
    pub wallet_address: Option<String>,
    /// Human decimal amount, scaled by the token decimals.
    pub amount: Option<String>,
    /// Integer minor-unit amount; wins over `amount` when both are given.
    pub amount_minor: Option<String>,
    pub token_symbol: Option<String>,
    pub reference: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdminAdjustmentResult {
    pub entry: LedgerEntry,
    pub snapshot: Snapshot,
}

pub struct AdminService {
    identity: Arc<IdentityService>,
    balances: Arc<BalanceService>,
}

impl AdminService {
    pub fn new(identity: Arc<IdentityService>, balances: Arc<BalanceService>) -> Self {
        Self { identity, balances }
    }

    pub async fn credit(&self, request: AdminAdjustment) -> Result<AdminAdjustmentResult> {
        self.adjust(EntryType::Credit, request).await
    }

    /// Checks the raw balance only; outstanding withdrawal locks do not block it.
    pub async fn debit(&self, request: AdminAdjustment) -> Result<AdminAdjustmentResult> {
        self.adjust(EntryType::Debit, request).await
    }

    async fn adjust(
        &self,
        entry_type: EntryType,
        request: AdminAdjustment
    ) -> Result<AdminAdjustmentResult> {
        // Input is validated before any storage round trip.
        let amount = self.parse_amount(&request)?;
        let token_symbol = self.check_token(request.token_symbol.as_deref())?;

        let target = self.identity.resolve_target(
            request.user_id,
            request.wallet_address.as_deref()
        ).await?;
        let wallet = self.balances.ensure_wallet(
            target.user_id,
            target.wallet_address.as_deref()
        ).await?;

        let entry = NewLedgerEntry {
            entry_type,
            amount,
            token_symbol,
            reference: non_empty(request.reference),
            metadata: sanitize_metadata(request.metadata),
            created_by: Some(non_empty(request.created_by).unwrap_or_else(|| DEFAULT_ACTOR.to_string())),
        };
        let mutation = self.balances.apply_entry(wallet.id, entry).await?;
        let snapshot = self.balances.snapshot_of(wallet).await?;

        Ok(AdminAdjustmentResult {
            entry: mutation.entry,
            snapshot,
        })
    }

    fn parse_amount(&self, request: &AdminAdjustment) -> Result<i128> {
        let minor = request.amount_minor.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let human = request.amount.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let amount = match (minor, human) {
            (Some(minor), _) => parse_minor(minor)?,
            (None, Some(human)) => parse_units(human, self.balances.token().decimals)?,
            (None, None) => {
                return Err(AppError::AmountRequired);
            }
        };
        ensure_positive(amount)
    }

    fn check_token(&self, requested: Option<&str>) -> Result<String> {
        let configured = &self.balances.token().symbol;
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(symbol) if !symbol.eq_ignore_ascii_case(configured) => {
                Err(AppError::TokenMismatch(symbol.to_string()))
            }
            _ => Ok(configured.clone()),
        }
    }
}

/// Only JSON objects are kept as entry metadata.
fn sanitize_metadata(value: Option<serde_json::Value>) -> Option<serde_json::Value> {
    value.filter(|v| v.is_object())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
