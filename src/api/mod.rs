use std::sync::Arc;

use axum::{
    extract::{ rejection::JsonRejection, FromRequest, FromRequestParts },
    http::request::Parts,
    routing::{ get, post },
    Router,
};
use sha2::{ Digest, Sha256 };
use tower_http::{ cors::CorsLayer, trace::TraceLayer };
use uuid::Uuid;

pub mod dto;
pub mod health;
pub mod user;
pub mod balance;
pub mod admin;
pub mod withdraw;
pub mod report;

use crate::config::Config;
use crate::error::AppError;
use crate::notify::NotificationDispatcher;
use crate::services::{
    AdminService,
    BalanceService,
    IdentityService,
    Session,
    TreasuryService,
    WithdrawalService,
};
use crate::store::LedgerStore;

pub const SESSION_USER_HEADER: &str = "x-session-user-id";
pub const SESSION_WALLET_HEADER: &str = "x-session-wallet-address";
pub const ADMIN_TOKEN_HEADER: &str = "x-internal-admin-token";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub identity_service: Arc<IdentityService>,
    pub balance_service: Arc<BalanceService>,
    pub admin_service: Arc<AdminService>,
    pub withdrawal_service: Arc<WithdrawalService>,
    pub treasury_service: Arc<TreasuryService>,
    pub admin_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        identity_service: Arc<IdentityService>,
        balance_service: Arc<BalanceService>,
        admin_service: Arc<AdminService>,
        withdrawal_service: Arc<WithdrawalService>,
        treasury_service: Arc<TreasuryService>,
        admin_secret: Option<String>
    ) -> Self {
        Self {
            store,
            identity_service,
            balance_service,
            admin_service,
            withdrawal_service,
            treasury_service,
            admin_secret: admin_secret.map(Arc::from),
        }
    }

    /// Wire every service from configuration around one store.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn LedgerStore>,
        notifications: NotificationDispatcher
    ) -> Self {
        let identity_service = Arc::new(IdentityService::new(store.clone()));
        let balance_service = Arc::new(
            BalanceService::new(store.clone(), config.token.clone(), config.recent_ledger_entries)
        );
        let admin_service = Arc::new(
            AdminService::new(identity_service.clone(), balance_service.clone())
        );
        let withdrawal_service = Arc::new(
            WithdrawalService::new(
                store.clone(),
                balance_service.clone(),
                config.withdraw.clone(),
                notifications.clone()
            )
        );
        let treasury_service = Arc::new(
            TreasuryService::new(config.treasury.clone(), config.token.clone(), notifications)
        );

        Self::new(
            store,
            identity_service,
            balance_service,
            admin_service,
            withdrawal_service,
            treasury_service,
            config.admin_secret.clone()
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/user/register-wallet", post(user::register_wallet))
        .route("/api/internal-balance", get(balance::get_snapshot))
        .route(
            "/api/internal-balance/default-withdraw-address",
            post(balance::set_default_withdraw_address)
        )
        .route("/api/internal-balance/debit", post(admin::debit))
        .route("/api/internal-balance/credit", post(admin::credit))
        .route("/api/internal-balance/treasury", post(admin::check_treasury))
        .route(
            "/api/internal-balance/withdraw",
            get(withdraw::list_withdrawals).post(withdraw::create_withdrawal)
        )
        .route("/api/internal-balance/withdraw/report", get(report::withdraw_report))
        .route("/api/internal-balance/withdraw/{id}/cancel", post(withdraw::cancel_withdrawal))
        .route("/api/internal-balance/withdraw/{id}/status", post(admin::update_withdraw_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// JSON body whose rejection renders as an `INVALID_INPUT` error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

/// Gateway-forwarded identity; missing headers mean "no session".
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = match header(parts, SESSION_USER_HEADER) {
            Some(raw) =>
                Some(
                    raw
                        .parse::<Uuid>()
                        .map_err(|_| AppError::InvalidInput("Malformed session user id".to_string()))?
                ),
            None => None,
        };

        Ok(Session {
            user_id,
            wallet_address: header(parts, SESSION_WALLET_HEADER).map(str::to_string),
        })
    }
}

/// Proof that the request carried the admin shared secret.
pub struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState
    ) -> Result<Self, Self::Rejection> {
        let secret = state.admin_secret.as_deref().ok_or(AppError::AdminNotConfigured)?;
        let provided = header(parts, ADMIN_TOKEN_HEADER).ok_or(AppError::InvalidAdminToken)?;

        if !constant_time_eq(provided, secret) {
            tracing::warn!("Rejected admin request with invalid token");
            return Err(AppError::InvalidAdminToken);
        }

        Ok(AdminAccess)
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Compares fixed-length digests so timing reveals neither content nor length.
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());

    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("s3cret", "s3cret"));
        assert!(!constant_time_eq("s3cret", "s3cres"));
        assert!(!constant_time_eq("", "s3cret"));
    }
}
