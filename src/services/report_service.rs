use chrono::SecondsFormat;
use csv::{ QuoteStyle, WriterBuilder };

use crate::error::{ AppError, Result };
use crate::models::WithdrawReportRow;

pub const WITHDRAW_REPORT_COLUMNS: [&str; 12] = [
    "id",
    "wallet_id",
    "user_id",
    "wallet_address",
    "amount",
    "token_symbol",
    "destination_address",
    "status",
    "reviewer_id",
    "tx_hash",
    "created_at",
    "updated_at",
];

/// Render the withdraw export: a bare header line, then every value quoted
/// with embedded quotes doubled. Amounts are minor units.
pub fn render_withdraw_csv(rows: &[WithdrawReportRow]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    for row in rows {
        let request = &row.request;
        writer
            .write_record([
                request.id.to_string(),
                request.wallet_id.to_string(),
                request.user_id.map(|id| id.to_string()).unwrap_or_default(),
                row.wallet_address.clone().unwrap_or_default(),
                request.amount.to_string(),
                request.token_symbol.clone(),
                request.destination_address.clone(),
                request.status.to_string(),
                request.reviewer_id.clone().unwrap_or_default(),
                request.tx_hash.clone().unwrap_or_default(),
                request.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                request.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ])
            .map_err(|e| AppError::Internal(format!("Failed to write CSV row: {}", e)))?;
    }

    let body = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush CSV: {}", e)))?;
    let body = String::from_utf8(body).map_err(|e|
        AppError::Internal(format!("CSV is not valid UTF-8: {}", e))
    )?;

    Ok(format!("{}\n{}", WITHDRAW_REPORT_COLUMNS.join(","), body))
}
