use axum::{ body::Bytes, extract::{ Path, Query, State }, Json };
use serde::{ Deserialize, Serialize };

use crate::error::{ AppError, Result };
use crate::services::{ CreateWithdrawal, Session };

use super::admin::{ parse_request_id, WithdrawMutationResponse };
use super::dto::{ BalanceDto, WithdrawRequestDto };
use super::{ AppJson, AppState };

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawListQuery {
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Serialize)]
pub struct WithdrawListResponse {
    pub requests: Vec<WithdrawRequestDto>,
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<WithdrawListQuery>
) -> Result<Json<WithdrawListResponse>> {
    let identity = state.identity_service.resolve(&session, query.wallet_address.as_deref()).await?;
    let requests = state.withdrawal_service.list(&identity).await?;

    Ok(
        Json(WithdrawListResponse {
            requests: requests.iter().map(WithdrawRequestDto::from).collect(),
        })
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub destination_address: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Serialize)]
pub struct CreateWithdrawalResponse {
    pub request: WithdrawRequestDto,
    pub balance: BalanceDto,
}

pub async fn create_withdrawal(
    State(state): State<AppState>,
    session: Session,
    AppJson(request): AppJson<CreateWithdrawalRequest>
) -> Result<Json<CreateWithdrawalResponse>> {
    let identity = state.identity_service.resolve(&session, request.wallet_address.as_deref()).await?;

    let mutation = state.withdrawal_service.create(&identity, CreateWithdrawal {
        amount: request.amount,
        destination_address: request.destination_address,
        note: request.note,
    }).await?;

    let decimals = state.balance_service.token().decimals;
    Ok(
        Json(CreateWithdrawalResponse {
            request: WithdrawRequestDto::from(&mutation.request),
            balance: BalanceDto::new(&mutation.balance, decimals),
        })
    )
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CancelWithdrawalRequest {
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn cancel_withdrawal(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
    body: Bytes
) -> Result<Json<WithdrawMutationResponse>> {
    let request_id = parse_request_id(&id)?;
    // The body is optional for cancellation.
    let request: CancelWithdrawalRequest = if body.is_empty() {
        CancelWithdrawalRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidInput(e.to_string()))?
    };

    let identity = state.identity_service.resolve(&session, request.wallet_address.as_deref()).await?;
    let mutation = state.withdrawal_service.cancel(&identity, request_id, request.notes).await?;

    let decimals = state.balance_service.token().decimals;
    Ok(
        Json(WithdrawMutationResponse {
            request: WithdrawRequestDto::from(&mutation.request),
            balance: BalanceDto::new(&mutation.balance, decimals),
            payout: None,
        })
    )
}
