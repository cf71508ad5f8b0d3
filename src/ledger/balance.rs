use crate::enums::EntryType;
use crate::error::{ AppError, Result };

use super::amount::{ ensure_positive, MAX_AMOUNT_MINOR };

/// The three materialized counters of a wallet balance row.
///
/// Both stores load this under the wallet's row lock, compute the next
/// state here, and write it back together with any ledger row. Keeping the
/// arithmetic in one place is what makes the memory store a faithful
/// stand-in for Postgres in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceState {
    pub balance: i128,
    pub pending_onchain: i128,
    pub locked_amount: i128,
}

impl BalanceState {
    pub fn available(&self) -> i128 {
        self.balance - self.pending_onchain - self.locked_amount
    }

    /// Post one ledger entry. Returns the next state and the signed ledger amount.
    ///
    /// Outflows compare against the raw `balance`, not `available`.
    pub fn apply_entry(&self, entry_type: EntryType, amount: i128) -> Result<(BalanceState, i128)> {
        let amount = ensure_positive(amount)?;
        let signed = entry_type.signed(amount);

        let balance = self.balance
            .checked_add(signed)
            .ok_or_else(|| AppError::InvalidAmount("balance overflow".to_string()))?;

        if balance < 0 {
            return Err(AppError::InsufficientFunds);
        }
        if balance > MAX_AMOUNT_MINOR {
            return Err(AppError::InvalidAmount("balance would exceed the ledger maximum".to_string()));
        }

        Ok((BalanceState { balance, ..*self }, signed))
    }

    /// Lock funds for a new withdraw request.
    pub fn reserve(&self, amount: i128) -> Result<BalanceState> {
        let amount = ensure_positive(amount)?;

        if self.available() < amount {
            return Err(AppError::InsufficientFunds);
        }

        Ok(BalanceState {
            locked_amount: self.locked_amount + amount,
            ..*self
        })
    }

    /// Drop a lock without touching the balance (rejected or cancelled request).
    pub fn release(&self, amount: i128) -> Result<BalanceState> {
        let amount = ensure_positive(amount)?;

        if self.locked_amount < amount {
            return Err(
                AppError::Internal(
                    format!("lock underflow: locked {} < release {}", self.locked_amount, amount)
                )
            );
        }

        Ok(BalanceState {
            locked_amount: self.locked_amount - amount,
            ..*self
        })
    }

    /// Consume a lock as a payout: lock and balance both drop by `amount`.
    pub fn settle(&self, amount: i128) -> Result<(BalanceState, i128)> {
        let released = self.release(amount)?;
        released.apply_entry(EntryType::Payout, amount)
    }
}
