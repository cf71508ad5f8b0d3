use axum::{ extract::{ Query, State }, Json };
use serde::{ Deserialize, Serialize };

use crate::error::Result;
use crate::services::Session;

use super::dto::{ SnapshotDto, WalletDto };
use super::{ AppJson, AppState };

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    #[serde(default)]
    pub wallet_address: Option<String>,
}

pub async fn get_snapshot(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SnapshotQuery>
) -> Result<Json<SnapshotDto>> {
    let identity = state.identity_service.resolve(&session, query.wallet_address.as_deref()).await?;
    let snapshot = state.balance_service.snapshot(&identity).await?;

    Ok(Json(SnapshotDto::from(&snapshot)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultWithdrawAddressRequest {
    /// Null or empty clears the preference.
    #[serde(default)]
    pub default_withdraw_address: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub wallet: WalletDto,
}

pub async fn set_default_withdraw_address(
    State(state): State<AppState>,
    session: Session,
    AppJson(request): AppJson<DefaultWithdrawAddressRequest>
) -> Result<Json<WalletResponse>> {
    let identity = state.identity_service.resolve(&session, request.wallet_address.as_deref()).await?;
    let wallet = state.balance_service.set_default_withdraw_address(
        &identity,
        request.default_withdraw_address.as_deref()
    ).await?;

    Ok(Json(WalletResponse { wallet: WalletDto::from(&wallet) }))
}
