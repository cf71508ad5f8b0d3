//! Fixed-point token amounts.
//!
//! Every amount inside the ledger is an integer count of minor units
//! (`human * 10^decimals`). Conversions to and from decimal strings are
//! exact: input with more fractional digits than the token supports is
//! rejected, never rounded.

use sea_orm::prelude::Decimal;

use crate::error::{ AppError, Result };

/// Largest amount (and balance) the ledger accepts, in minor units.
pub const MAX_AMOUNT_MINOR: i128 = 10i128.pow(28) - 1;

/// Highest `decimals` value whose whole-unit amounts still fit the bound above.
pub const MAX_DECIMALS: u32 = 27;

/// Parse a human decimal string (`"12.5"`) into minor units.
pub fn parse_units(value: &str, decimals: u32) -> Result<i128> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(AppError::InvalidAmountFormat);
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidAmountFormat);
    }
    if fraction.len() > (decimals as usize) {
        return Err(AppError::InvalidAmountFormat);
    }

    let mut digits = String::with_capacity(whole.len() + (decimals as usize));
    digits.push_str(whole);
    digits.push_str(fraction);
    for _ in fraction.len()..decimals as usize {
        digits.push('0');
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    // 29 digits already exceed the bound; also keeps the parse below from overflowing.
    if digits.len() > 28 {
        return Err(AppError::InvalidAmount("amount exceeds the ledger maximum".to_string()));
    }

    digits.parse::<i128>().map_err(|_| AppError::InvalidAmountFormat)
}

/// Parse an integer minor-unit string (`"1000000"`).
pub fn parse_minor(value: &str) -> Result<i128> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidAmountFormat);
    }

    let digits = value.trim_start_matches('0');
    if digits.len() > 28 {
        return Err(AppError::InvalidAmount("amount exceeds the ledger maximum".to_string()));
    }
    if digits.is_empty() {
        return Ok(0);
    }

    digits.parse::<i128>().map_err(|_| AppError::InvalidAmountFormat)
}

/// Format minor units as the shortest exact decimal string (`"100"`, `"0.5"`).
pub fn format_units(value: i128, decimals: u32) -> String {
    let negative = value < 0;
    let magnitude = value.unsigned_abs().to_string();
    let decimals = decimals as usize;

    let (whole, fraction) = if magnitude.len() > decimals {
        let split = magnitude.len() - decimals;
        (magnitude[..split].to_string(), magnitude[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", magnitude, width = decimals))
    };

    let fraction = fraction.trim_end_matches('0');
    let sign = if negative { "-" } else { "" };

    if fraction.is_empty() {
        format!("{}{}", sign, whole)
    } else {
        format!("{}{}.{}", sign, whole, fraction)
    }
}

/// Format for display: exact, with at least `min_fraction` fraction digits.
pub fn format_display(value: i128, decimals: u32, min_fraction: usize) -> String {
    let exact = format_units(value, decimals);
    let min_fraction = min_fraction.min(decimals as usize);
    if min_fraction == 0 {
        return exact;
    }

    match exact.split_once('.') {
        Some((whole, fraction)) if fraction.len() < min_fraction => {
            format!("{}.{:0<width$}", whole, fraction, width = min_fraction)
        }
        Some(_) => exact,
        None => format!("{}.{}", exact, "0".repeat(min_fraction)),
    }
}

/// Reject zero, negative, and out-of-range amounts.
pub fn ensure_positive(amount: i128) -> Result<i128> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount("amount must be greater than zero".to_string()));
    }
    if amount > MAX_AMOUNT_MINOR {
        return Err(AppError::InvalidAmount("amount exceeds the ledger maximum".to_string()));
    }
    Ok(amount)
}

/// Database representation (`NUMERIC(78,0)`).
pub fn to_decimal(value: i128) -> Result<Decimal> {
    Decimal::try_from_i128_with_scale(value, 0).map_err(|e|
        AppError::Internal(format!("Amount {} does not fit the storage type: {}", value, e))
    )
}

pub fn from_decimal(value: Decimal) -> Result<i128> {
    let value = value.normalize();
    if value.scale() != 0 {
        return Err(AppError::Internal(format!("Stored amount {} is not integral", value)));
    }
    Ok(value.mantissa())
}
