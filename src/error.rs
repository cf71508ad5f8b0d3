use thiserror::Error;

use crate::enums::WithdrawStatus;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Invalid wallet address")]
    InvalidWallet,

    #[error("Amount is required")]
    AmountRequired,

    #[error("Invalid amount: {0}")] InvalidAmount(String),

    #[error("Invalid amount format")]
    InvalidAmountFormat,

    #[error("Invalid destination address")]
    DestinationInvalid,

    #[error("Destination address is blocked")]
    DestinationBlocked,

    #[error("Daily withdrawal limit exceeded")]
    LimitDailyExceeded,

    #[error("Monthly withdrawal limit exceeded")]
    LimitMonthlyExceeded,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid admin token")]
    InvalidAdminToken,

    #[error("Admin secret is not configured")]
    AdminNotConfigured,

    #[error("Forbidden")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Withdraw request not found")]
    WithdrawNotFound,

    #[error("Cannot move withdraw request from {from} to {to}")] InvalidStatusTransition {
        from: WithdrawStatus,
        to: WithdrawStatus,
    },

    #[error("Token {0} is not managed by this ledger")] TokenMismatch(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Machine-readable code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(e) if is_unavailable(e) => "DATABASE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::InvalidWallet => "INVALID_WALLET",
            AppError::AmountRequired => "AMOUNT_REQUIRED",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::InvalidAmountFormat => "INVALID_AMOUNT_FORMAT",
            AppError::DestinationInvalid => "DESTINATION_INVALID",
            AppError::DestinationBlocked => "DESTINATION_BLOCKED",
            AppError::LimitDailyExceeded => "LIMIT_DAILY_EXCEEDED",
            AppError::LimitMonthlyExceeded => "LIMIT_MONTHLY_EXCEEDED",
            AppError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            AppError::AuthRequired => "AUTH_REQUIRED",
            AppError::InvalidAdminToken => "INVALID_ADMIN_TOKEN",
            AppError::AdminNotConfigured => "ADMIN_NOT_CONFIGURED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::WalletNotFound => "WALLET_NOT_FOUND",
            AppError::WithdrawNotFound => "WITHDRAW_NOT_FOUND",
            AppError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            AppError::TokenMismatch(_) => "TOKEN_MISMATCH",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Infrastructure failures that a caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Database(e) if is_unavailable(e))
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let (message, field) = match self {
            // Driver detail stays in the logs.
            AppError::Database(e) if is_unavailable(e) =>
                ("Database temporarily unavailable, retry later".to_string(), None),
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) =>
                ("Internal server error".to_string(), None),
            AppError::InvalidWallet => (self.to_string(), Some("walletAddress".to_string())),
            | AppError::AmountRequired
            | AppError::InvalidAmount(_)
            | AppError::InvalidAmountFormat => (self.to_string(), Some("amount".to_string())),
            AppError::DestinationInvalid | AppError::DestinationBlocked =>
                (self.to_string(), Some("destinationAddress".to_string())),
            AppError::TokenMismatch(_) => (self.to_string(), Some("tokenSymbol".to_string())),
            _ => (self.to_string(), None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                field,
            },
        }
    }

    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;

        match self {
            AppError::Database(e) if is_unavailable(e) => StatusCode::SERVICE_UNAVAILABLE,
            | AppError::InvalidInput(_)
            | AppError::InvalidWallet
            | AppError::AmountRequired
            | AppError::InvalidAmount(_)
            | AppError::InvalidAmountFormat
            | AppError::DestinationInvalid
            | AppError::TokenMismatch(_) => StatusCode::BAD_REQUEST,
            AppError::AuthRequired | AppError::InvalidAdminToken => StatusCode::UNAUTHORIZED,
            | AppError::DestinationBlocked
            | AppError::LimitDailyExceeded
            | AppError::LimitMonthlyExceeded
            | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::WalletNotFound | AppError::WithdrawNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::InsufficientFunds | AppError::InvalidStatusTransition { .. } => {
                StatusCode::CONFLICT
            }
            AppError::AdminNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Pool exhaustion or a dropped connection, as opposed to a failed statement.
fn is_unavailable(err: &sea_orm::DbErr) -> bool {
    matches!(err, sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_))
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
