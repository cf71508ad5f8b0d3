use crate::enums::WithdrawStatus;
use crate::error::{ AppError, Result };

/// What a status change does to the request's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockEffect {
    /// Lock stays in place (`pending -> approved`).
    Keep,
    /// Lock is dropped, balance untouched (`rejected`, `cancelled`).
    Release,
    /// Lock is consumed by a payout entry (`completed`).
    Settle,
}

pub fn transition_effect(from: WithdrawStatus, to: WithdrawStatus) -> Result<LockEffect> {
    if !from.can_transition_to(to) {
        return Err(AppError::InvalidStatusTransition { from, to });
    }

    Ok(match to {
        WithdrawStatus::Completed => LockEffect::Settle,
        WithdrawStatus::Rejected | WithdrawStatus::Cancelled => LockEffect::Release,
        WithdrawStatus::Approved | WithdrawStatus::Pending => LockEffect::Keep,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use WithdrawStatus::*;

    #[test]
    fn test_effects() {
        assert_eq!(transition_effect(Pending, Approved).unwrap(), LockEffect::Keep);
        assert_eq!(transition_effect(Pending, Rejected).unwrap(), LockEffect::Release);
        assert_eq!(transition_effect(Approved, Cancelled).unwrap(), LockEffect::Release);
        assert_eq!(transition_effect(Approved, Completed).unwrap(), LockEffect::Settle);
    }

    #[test]
    fn test_terminal_is_final() {
        for from in [Completed, Rejected, Cancelled] {
            for to in [Pending, Approved, Completed, Rejected, Cancelled] {
                assert!(matches!(
                    transition_effect(from, to),
                    Err(AppError::InvalidStatusTransition { .. })
                ));
            }
        }
    }
}
