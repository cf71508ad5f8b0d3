use axum::{ extract::{ Path, State }, Json };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::enums::{ TreasuryAlertLevel, WithdrawStatus };
use crate::error::{ AppError, Result };
use crate::models::WithdrawTransition;
use crate::services::admin_service::AdminAdjustmentResult;
use crate::services::{ AdminAdjustment, TreasuryReport };

use super::dto::{ BalanceDto, LedgerEntryDto, SnapshotDto, WithdrawRequestDto };
use super::{ AdminAccess, AppJson, AppState };

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBalanceRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub amount_minor: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl From<AdminBalanceRequest> for AdminAdjustment {
    fn from(request: AdminBalanceRequest) -> Self {
        Self {
            user_id: request.user_id,
            wallet_address: request.wallet_address,
            amount: request.amount,
            amount_minor: request.amount_minor,
            token_symbol: request.token_symbol,
            reference: request.reference,
            metadata: request.metadata,
            created_by: request.created_by,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBalanceResponse {
    #[serde(flatten)]
    pub snapshot: SnapshotDto,
    pub last_entry: LedgerEntryDto,
}

impl From<AdminAdjustmentResult> for AdminBalanceResponse {
    fn from(result: AdminAdjustmentResult) -> Self {
        Self {
            snapshot: SnapshotDto::from(&result.snapshot),
            last_entry: LedgerEntryDto::from(&result.entry),
        }
    }
}

pub async fn debit(
    _admin: AdminAccess,
    State(state): State<AppState>,
    AppJson(request): AppJson<AdminBalanceRequest>
) -> Result<Json<AdminBalanceResponse>> {
    let result = state.admin_service.debit(request.into()).await?;

    Ok(Json(result.into()))
}

pub async fn credit(
    _admin: AdminAccess,
    State(state): State<AppState>,
    AppJson(request): AppJson<AdminBalanceRequest>
) -> Result<Json<AdminBalanceResponse>> {
    let result = state.admin_service.credit(request.into()).await?;

    Ok(Json(result.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub reviewer_id: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawMutationResponse {
    pub request: WithdrawRequestDto,
    pub balance: BalanceDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<LedgerEntryDto>,
}

pub async fn update_withdraw_status(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(request): AppJson<UpdateStatusRequest>
) -> Result<Json<WithdrawMutationResponse>> {
    let request_id = parse_request_id(&id)?;
    let status: WithdrawStatus = request.status.trim().parse()?;

    let mutation = state.withdrawal_service.transition(request_id, WithdrawTransition {
        status,
        expected_from: None,
        reviewer_id: request.reviewer_id,
        tx_hash: request.tx_hash,
        notes: request.notes,
    }).await?;

    let decimals = state.balance_service.token().decimals;
    Ok(
        Json(WithdrawMutationResponse {
            request: WithdrawRequestDto::from(&mutation.request),
            balance: BalanceDto::new(&mutation.balance, decimals),
            payout: mutation.payout.as_ref().map(LedgerEntryDto::from),
        })
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryCheckRequest {
    #[serde(default)]
    pub treasury_address: Option<String>,
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub balance_minor: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryCheckResponse {
    pub balance: String,
    pub alert: Option<TreasuryAlertLevel>,
    pub thresholds_configured: bool,
}

pub async fn check_treasury(
    _admin: AdminAccess,
    State(state): State<AppState>,
    AppJson(request): AppJson<TreasuryCheckRequest>
) -> Result<Json<TreasuryCheckResponse>> {
    let check = state.treasury_service.check(TreasuryReport {
        treasury_address: request.treasury_address,
        balance: request.balance,
        balance_minor: request.balance_minor,
    })?;

    Ok(
        Json(TreasuryCheckResponse {
            balance: check.balance.to_string(),
            alert: check.level,
            thresholds_configured: check.thresholds_configured,
        })
    )
}

pub(super) fn parse_request_id(raw: &str) -> Result<Uuid> {
    raw.parse().map_err(|_| AppError::InvalidInput("Malformed withdraw request id".to_string()))
}
