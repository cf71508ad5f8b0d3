use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };

use crate::error::AppError;

// ─── EntryType ──────────────────────────────────────────────────────

/// Kind of a ledger entry. The kind decides the sign of the stored amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
    Adjustment,
    Payout,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
            EntryType::Adjustment => "adjustment",
            EntryType::Payout => "payout",
        }
    }

    /// Whether an entry of this kind increases the balance.
    pub fn is_inflow(&self) -> bool {
        matches!(self, EntryType::Credit | EntryType::Adjustment)
    }

    /// Signed ledger amount for a positive magnitude.
    pub fn signed(&self, amount: i128) -> i128 {
        if self.is_inflow() { amount } else { -amount }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credit" => Ok(EntryType::Credit),
            "debit" => Ok(EntryType::Debit),
            "adjustment" => Ok(EntryType::Adjustment),
            "payout" => Ok(EntryType::Payout),
            _ => Err(AppError::InvalidInput(format!("Invalid entry type: {}", s))),
        }
    }
}

// ─── WithdrawStatus ─────────────────────────────────────────────────

/// Lifecycle of a withdraw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl WithdrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawStatus::Pending => "pending",
            WithdrawStatus::Approved => "approved",
            WithdrawStatus::Rejected => "rejected",
            WithdrawStatus::Completed => "completed",
            WithdrawStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawStatus::Rejected | WithdrawStatus::Completed | WithdrawStatus::Cancelled)
    }

    /// Statuses whose amount no longer counts toward withdrawal volume.
    pub fn excluded_from_volume() -> &'static [WithdrawStatus] {
        &[WithdrawStatus::Rejected, WithdrawStatus::Cancelled]
    }

    pub fn counts_toward_volume(&self) -> bool {
        !Self::excluded_from_volume().contains(self)
    }

    pub fn can_transition_to(&self, next: WithdrawStatus) -> bool {
        use WithdrawStatus::*;

        matches!(
            (self, next),
            (Pending, Approved) |
                (Pending, Rejected) |
                (Pending, Cancelled) |
                (Approved, Completed) |
                (Approved, Rejected) |
                (Approved, Cancelled)
        )
    }
}

impl fmt::Display for WithdrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WithdrawStatus::Pending),
            "approved" => Ok(WithdrawStatus::Approved),
            "rejected" => Ok(WithdrawStatus::Rejected),
            "completed" => Ok(WithdrawStatus::Completed),
            "cancelled" => Ok(WithdrawStatus::Cancelled),
            _ => Err(AppError::InvalidInput(format!("Invalid withdraw status: {}", s))),
        }
    }
}

// ─── TreasuryAlertLevel ─────────────────────────────────────────────

/// Severity of a treasury balance alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreasuryAlertLevel {
    Low,
    Critical,
}

impl TreasuryAlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreasuryAlertLevel::Low => "low",
            TreasuryAlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for TreasuryAlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_sign() {
        assert_eq!(EntryType::Credit.signed(5), 5);
        assert_eq!(EntryType::Adjustment.signed(5), 5);
        assert_eq!(EntryType::Debit.signed(5), -5);
        assert_eq!(EntryType::Payout.signed(5), -5);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            WithdrawStatus::Pending,
            WithdrawStatus::Approved,
            WithdrawStatus::Rejected,
            WithdrawStatus::Completed,
            WithdrawStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<WithdrawStatus>().unwrap(), status);
        }
        assert!("processing".parse::<WithdrawStatus>().is_err());
    }

    #[test]
    fn test_transitions() {
        use WithdrawStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Approved));
    }
}
