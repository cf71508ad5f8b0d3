use axum::{
    extract::{ Query, State },
    http::header,
    response::{ IntoResponse, Response },
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::Result;
use crate::services::report_service::render_withdraw_csv;

use super::{ AdminAccess, AppState };

#[derive(Deserialize)]
pub struct ReportQuery {
    /// Kept as text: anything non-numeric falls back to the default limit.
    #[serde(default)]
    pub limit: Option<String>,
}

pub async fn withdraw_report(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>
) -> Result<Response> {
    let limit = query.limit.as_deref().and_then(|raw| raw.trim().parse::<u64>().ok());

    let rows = state.withdrawal_service.report(limit).await?;
    let body = render_withdraw_csv(&rows)?;

    tracing::info!(rows = rows.len(), "Withdraw report exported");

    let disposition = format!(
        "attachment; filename=\"withdraw-report-{}.csv\"",
        Utc::now().timestamp_millis()
    );
    Ok(
        (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            body,
        ).into_response()
    )
}
