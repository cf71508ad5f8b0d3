use crate::config::{ TokenConfig, TreasuryThresholds };
use crate::enums::TreasuryAlertLevel;
use crate::error::{ AppError, Result };
use crate::ledger::amount::{ format_units, parse_minor, parse_units };
use crate::notify::{ AdminNotification, NotificationDispatcher };

/// Observed on-chain treasury balance reported by an operator or a cron job.
#[derive(Debug, Clone, Default)]
pub struct TreasuryReport {
    pub treasury_address: Option<String>,
    pub balance: Option<String>,
    pub balance_minor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreasuryCheck {
    pub balance: i128,
    pub level: Option<TreasuryAlertLevel>,
    pub thresholds_configured: bool,
}

pub struct TreasuryService {
    thresholds: TreasuryThresholds,
    token: TokenConfig,
    notifications: NotificationDispatcher,
}

impl TreasuryService {
    pub fn new(
        thresholds: TreasuryThresholds,
        token: TokenConfig,
        notifications: NotificationDispatcher
    ) -> Self {
        Self {
            thresholds,
            token,
            notifications,
        }
    }

    pub fn check(&self, report: TreasuryReport) -> Result<TreasuryCheck> {
        let balance = match (report.balance_minor.as_deref(), report.balance.as_deref()) {
            (Some(minor), _) => parse_minor(minor)?,
            (None, Some(human)) => parse_units(human, self.token.decimals)?,
            (None, None) => {
                return Err(AppError::AmountRequired);
            }
        };

        let thresholds_configured = self.thresholds.low.is_some() || self.thresholds.critical.is_some();
        if !thresholds_configured {
            tracing::info!("No treasury thresholds configured; skipping alert evaluation");
        }

        let level = alert_level(&self.thresholds, balance);
        if let Some(level) = level {
            let threshold = match level {
                TreasuryAlertLevel::Critical => self.thresholds.critical,
                TreasuryAlertLevel::Low => self.thresholds.low,
            }.unwrap_or_default();

            tracing::warn!(level = %level, balance = %balance, threshold = %threshold, "Treasury balance below threshold");

            self.notifications.dispatch(AdminNotification::TreasuryBalance {
                level,
                treasury_address: report.treasury_address,
                current_balance: format_units(balance, self.token.decimals),
                threshold: format_units(threshold, self.token.decimals),
                token_symbol: self.token.symbol.clone(),
            });
        }

        Ok(TreasuryCheck {
            balance,
            level,
            thresholds_configured,
        })
    }
}

/// Critical takes precedence over low; both are inclusive.
pub fn alert_level(thresholds: &TreasuryThresholds, balance: i128) -> Option<TreasuryAlertLevel> {
    if thresholds.critical.map_or(false, |critical| balance <= critical) {
        Some(TreasuryAlertLevel::Critical)
    } else if thresholds.low.map_or(false, |low| balance <= low) {
        Some(TreasuryAlertLevel::Low)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> TreasuryThresholds {
        TreasuryThresholds {
            low: Some(1_000),
            critical: Some(100),
        }
    }

    #[test]
    fn test_alert_level() {
        assert_eq!(alert_level(&thresholds(), 5_000), None);
        assert_eq!(alert_level(&thresholds(), 1_000), Some(TreasuryAlertLevel::Low));
        assert_eq!(alert_level(&thresholds(), 100), Some(TreasuryAlertLevel::Critical));
        assert_eq!(alert_level(&TreasuryThresholds::default(), 0), None);
    }

    #[test]
    fn test_check_parses_human_balance() {
        let service = TreasuryService::new(
            TreasuryThresholds { low: Some(10_000_000_000_000_000_000), critical: None },
            TokenConfig::default(),
            NotificationDispatcher::disabled()
        );

        let check = service
            .check(TreasuryReport { balance: Some("5".to_string()), ..Default::default() })
            .unwrap();

        assert_eq!(check.balance, 5_000_000_000_000_000_000);
        assert_eq!(check.level, Some(TreasuryAlertLevel::Low));
        assert!(check.thresholds_configured);
    }

    #[test]
    fn test_check_requires_balance() {
        let service = TreasuryService::new(
            thresholds(),
            TokenConfig::default(),
            NotificationDispatcher::disabled()
        );

        assert!(matches!(service.check(TreasuryReport::default()), Err(AppError::AmountRequired)));
    }
}
