use axum::{ extract::State, Json };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::Result;

use super::{ AppJson, AppState };

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWalletRequest {
    pub wallet_address: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWalletResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub is_new_user: bool,
    pub linked_existing_account: bool,
}

pub async fn register_wallet(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterWalletRequest>
) -> Result<Json<RegisterWalletResponse>> {
    let registered = state.identity_service.register_wallet(
        &request.wallet_address,
        request.email.as_deref(),
        request.name.as_deref()
    ).await?;

    Ok(
        Json(RegisterWalletResponse {
            success: true,
            user_id: registered.user.id,
            is_new_user: registered.is_new_user,
            linked_existing_account: registered.linked_existing_account,
        })
    )
}
