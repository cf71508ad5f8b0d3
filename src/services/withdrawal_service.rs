use std::sync::Arc;

use chrono::{ DateTime, Datelike, NaiveTime, Utc };
use uuid::Uuid;

use crate::address::normalize_address;
use crate::config::WithdrawPolicy;
use crate::enums::WithdrawStatus;
use crate::error::{ AppError, Result };
use crate::ledger::amount::{ ensure_positive, format_units, parse_units };
use crate::models::{
    NewWithdrawRequest,
    WithdrawFilter,
    WithdrawMutation,
    WithdrawReportRow,
    WithdrawRequest,
    WithdrawTransition,
};
use crate::notify::{ AdminNotification, NotificationDispatcher };
use crate::services::balance_service::BalanceService;
use crate::services::identity_service::ResolvedIdentity;
use crate::store::LedgerStore;

/// Maximum requests returned to a user listing their own withdrawals.
const LIST_LIMIT: u64 = 200;

pub const REPORT_DEFAULT_LIMIT: u64 = 1000;
pub const REPORT_MAX_LIMIT: u64 = 5000;

#[derive(Debug, Clone, Default)]
pub struct CreateWithdrawal {
    pub amount: Option<String>,
    pub destination_address: Option<String>,
    pub note: Option<String>,
}

pub struct WithdrawalService {
    store: Arc<dyn LedgerStore>,
    balances: Arc<BalanceService>,
    policy: WithdrawPolicy,
    notifications: NotificationDispatcher,
}

impl WithdrawalService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        balances: Arc<BalanceService>,
        policy: WithdrawPolicy,
        notifications: NotificationDispatcher
    ) -> Self {
        Self {
            store,
            balances,
            policy,
            notifications,
        }
    }

    /// Validate, check policy, then lock the amount and open a `pending` request.
    pub async fn create(
        &self,
        identity: &ResolvedIdentity,
        input: CreateWithdrawal
    ) -> Result<WithdrawMutation> {
        let decimals = self.balances.token().decimals;
        let amount = match input.amount.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => ensure_positive(parse_units(raw, decimals)?)?,
            None => {
                return Err(AppError::AmountRequired);
            }
        };

        // An explicit destination is validated before anything is written.
        let explicit = match input.destination_address.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let destination = normalize_address(raw).ok_or(AppError::DestinationInvalid)?;
                self.ensure_not_blocked(identity.user_id, &destination)?;
                Some(destination)
            }
            None => None,
        };

        let wallet = self.balances.ensure_wallet(
            identity.user_id,
            identity.wallet_address.as_deref()
        ).await?;

        let destination = match explicit {
            Some(destination) => destination,
            None => {
                let fallback = wallet.default_withdraw_address
                    .as_deref()
                    .or(identity.wallet_address.as_deref())
                    .or(wallet.wallet_address.as_deref())
                    .and_then(normalize_address)
                    .ok_or(AppError::DestinationInvalid)?;
                self.ensure_not_blocked(identity.user_id, &fallback)?;
                fallback
            }
        };

        self.check_limits(identity.user_id, amount, Utc::now()).await?;

        let note = input.note
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mutation = self.store.create_withdrawal(NewWithdrawRequest {
            wallet_id: wallet.id,
            user_id: Some(identity.user_id),
            token_symbol: self.balances.token().symbol.clone(),
            amount,
            destination_address: destination.clone(),
            notes: note,
        }).await;

        let mutation = match mutation {
            Ok(mutation) => mutation,
            Err(e @ AppError::InsufficientFunds) => {
                tracing::warn!(user_id = %identity.user_id, wallet_id = %wallet.id, amount = %amount, "Withdrawal rejected: insufficient funds");
                return Err(e);
            }
            Err(e) => {
                return Err(e);
            }
        };

        tracing::info!(
            request_id = %mutation.request.id,
            wallet_id = %wallet.id,
            amount = %amount,
            destination = %destination,
            locked = %mutation.balance.locked_amount,
            "Withdrawal request created"
        );

        self.notifications.dispatch(AdminNotification::NewWithdrawal {
            request_id: mutation.request.id,
            wallet_address: identity.wallet_address.clone().or(wallet.wallet_address),
            destination_address: destination,
            amount: format_units(amount, decimals),
            token_symbol: mutation.request.token_symbol.clone(),
        });

        Ok(mutation)
    }

    fn ensure_not_blocked(&self, user_id: Uuid, destination: &str) -> Result<()> {
        if self.policy.blocked_addresses.contains(destination) {
            tracing::warn!(%user_id, destination = %destination, "Withdrawal to blocked destination rejected");
            return Err(AppError::DestinationBlocked);
        }
        Ok(())
    }

    /// Rolling volume limits over the current UTC day and calendar month.
    async fn check_limits(&self, user_id: Uuid, amount: i128, now: DateTime<Utc>) -> Result<()> {
        if let Some(limit) = self.policy.daily_limit {
            let volume = self.store.withdraw_volume_since(user_id, day_start(now)).await?;
            if exceeds(volume, amount, limit) {
                tracing::warn!(%user_id, volume = %volume, amount = %amount, limit = %limit, "Daily withdrawal limit exceeded");
                return Err(AppError::LimitDailyExceeded);
            }
        }

        if let Some(limit) = self.policy.monthly_limit {
            let volume = self.store.withdraw_volume_since(user_id, month_start(now)).await?;
            if exceeds(volume, amount, limit) {
                tracing::warn!(%user_id, volume = %volume, amount = %amount, limit = %limit, "Monthly withdrawal limit exceeded");
                return Err(AppError::LimitMonthlyExceeded);
            }
        }

        Ok(())
    }

    pub async fn list(&self, identity: &ResolvedIdentity) -> Result<Vec<WithdrawRequest>> {
        let filter = WithdrawFilter {
            user_id: Some(identity.user_id),
            ..Default::default()
        };
        self.store.list_withdrawals(&filter, LIST_LIMIT).await
    }

    /// Owner cancellation of a still-pending request.
    pub async fn cancel(
        &self,
        identity: &ResolvedIdentity,
        request_id: Uuid,
        notes: Option<String>
    ) -> Result<WithdrawMutation> {
        let request = self.store.find_withdrawal(request_id).await?.ok_or(AppError::WithdrawNotFound)?;

        if request.user_id != Some(identity.user_id) {
            tracing::warn!(%request_id, user_id = %identity.user_id, "Cancellation of another user's request refused");
            return Err(AppError::Forbidden);
        }
        if request.status != WithdrawStatus::Pending {
            return Err(AppError::InvalidStatusTransition {
                from: request.status,
                to: WithdrawStatus::Cancelled,
            });
        }

        // Re-checked under the row lock: an approval may land before we get there.
        self.transition(request_id, WithdrawTransition {
            status: WithdrawStatus::Cancelled,
            expected_from: Some(WithdrawStatus::Pending),
            reviewer_id: None,
            tx_hash: None,
            notes,
        }).await
    }

    /// Admin status change. Terminal moves release the lock; `completed` also posts the payout.
    pub async fn transition(
        &self,
        request_id: Uuid,
        change: WithdrawTransition
    ) -> Result<WithdrawMutation> {
        let change = WithdrawTransition {
            reviewer_id: trimmed(change.reviewer_id),
            tx_hash: trimmed(change.tx_hash),
            notes: trimmed(change.notes),
            ..change
        };
        let status = change.status;

        let mutation = self.store.transition_withdrawal(request_id, change).await?;

        tracing::info!(
            %request_id,
            status = %status,
            wallet_id = %mutation.request.wallet_id,
            balance = %mutation.balance.balance,
            locked = %mutation.balance.locked_amount,
            payout = mutation.payout.is_some(),
            "Withdrawal request updated"
        );

        Ok(mutation)
    }

    /// Rows for the admin CSV export. Out-of-range limits fall back to the default.
    pub async fn report(&self, limit: Option<u64>) -> Result<Vec<WithdrawReportRow>> {
        self.store.withdraw_report(report_limit(limit)).await
    }

    pub async fn volume_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i128> {
        self.store.withdraw_volume_since(user_id, since).await
    }
}

pub fn report_limit(requested: Option<u64>) -> u64 {
    match requested {
        Some(limit) if limit > 0 => limit.min(REPORT_MAX_LIMIT),
        _ => REPORT_DEFAULT_LIMIT,
    }
}

fn exceeds(volume: i128, amount: i128, limit: i128) -> bool {
    volume.checked_add(amount).map_or(true, |total| total > limit)
}

fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    today.with_day(1).unwrap_or(today).and_time(NaiveTime::MIN).and_utc()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_windows() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 15, 4, 5).unwrap();

        assert_eq!(day_start(now), Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap());
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_exceeds() {
        assert!(!exceeds(60, 40, 100));
        assert!(exceeds(61, 40, 100));
        assert!(exceeds(i128::MAX, 1, 100));
    }

    #[test]
    fn test_report_limit() {
        assert_eq!(report_limit(None), 1000);
        assert_eq!(report_limit(Some(0)), 1000);
        assert_eq!(report_limit(Some(20)), 20);
        assert_eq!(report_limit(Some(9000)), 5000);
    }
}
