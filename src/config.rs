use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::address::parse_address_list;
use crate::ledger::amount::{ parse_units, MAX_DECIMALS };

const DEFAULT_DECIMALS: u32 = 18;
const DEFAULT_SYMBOL: &str = "TKN";

/// Token identity the ledger accounts in.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub symbol: String,
    pub decimals: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            decimals: DEFAULT_DECIMALS,
        }
    }
}

/// Connection pool bounds.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

/// Withdrawal policy. Limits are in minor units; `None` disables the check.
#[derive(Debug, Clone, Default)]
pub struct WithdrawPolicy {
    pub daily_limit: Option<i128>,
    pub monthly_limit: Option<i128>,
    pub blocked_addresses: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub admin_chat_id: i64,
}

/// Treasury alert thresholds in minor units.
#[derive(Debug, Clone, Default)]
pub struct TreasuryThresholds {
    pub low: Option<i128>,
    pub critical: Option<i128>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server_host: String,
    pub server_port: u16,
    pub admin_secret: Option<String>,
    pub token: TokenConfig,
    pub withdraw: WithdrawPolicy,
    pub recent_ledger_entries: u64,
    pub telegram: Option<TelegramConfig>,
    pub treasury: TreasuryThresholds,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            acquire_timeout: Duration::from_secs(
                env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()?
            ),
            idle_timeout: Duration::from_secs(
                env::var("DATABASE_IDLE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?
            ),
        };

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        let admin_secret = env::var("INTERNAL_BALANCE_SIGNING_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let token = TokenConfig {
            symbol: env::var("TOKEN_SYMBOL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
            decimals: Self::parse_decimals(env::var("TOKEN_DECIMALS").ok().as_deref()),
        };

        let withdraw = WithdrawPolicy {
            daily_limit: Self::parse_token_amount("INTERNAL_WITHDRAW_DAILY_LIMIT", token.decimals),
            monthly_limit: Self::parse_token_amount(
                "INTERNAL_WITHDRAW_MONTHLY_LIMIT",
                token.decimals
            ),
            blocked_addresses: parse_address_list(
                &env::var("TREASURY_BLOCKED_ADDRESSES").unwrap_or_default()
            ),
        };

        let recent_ledger_entries = env::var("LEDGER_RECENT_ENTRIES")
            .unwrap_or_else(|_| "50".to_string())
            .parse()?;

        let telegram = match (env::var("TELEGRAM_BOT_TOKEN"), env::var("TELEGRAM_ADMIN_CHAT_ID")) {
            (Ok(bot_token), Ok(chat_id)) if !bot_token.trim().is_empty() => {
                Some(TelegramConfig {
                    bot_token,
                    admin_chat_id: chat_id
                        .trim()
                        .parse()
                        .map_err(|_| "TELEGRAM_ADMIN_CHAT_ID must be a numeric chat id")?,
                })
            }
            _ => None,
        };

        let treasury = TreasuryThresholds {
            low: Self::parse_token_amount("TREASURY_BALANCE_LOW_THRESHOLD", token.decimals),
            critical: Self::parse_token_amount(
                "TREASURY_BALANCE_CRITICAL_THRESHOLD",
                token.decimals
            ),
        };

        Ok(Config {
            database,
            server_host,
            server_port,
            admin_secret,
            token,
            withdraw,
            recent_ledger_entries,
            telegram,
            treasury,
        })
    }

    /// Token decimals with the 18 fallback for unset, non-numeric, or out-of-range values.
    pub fn parse_decimals(raw: Option<&str>) -> u32 {
        match raw.map(|s| s.trim().parse::<u32>()) {
            Some(Ok(d)) if d > 0 && d <= MAX_DECIMALS => d,
            Some(_) => {
                tracing::warn!("Invalid TOKEN_DECIMALS value, falling back to {}", DEFAULT_DECIMALS);
                DEFAULT_DECIMALS
            }
            None => DEFAULT_DECIMALS,
        }
    }

    /// Optional token amount from the environment. Malformed values disable the setting.
    fn parse_token_amount(name: &str, decimals: u32) -> Option<i128> {
        let raw = env::var(name).ok().filter(|s| !s.trim().is_empty())?;

        match parse_units(&raw, decimals) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Invalid {} value. Expecting numeric token amount.", name);
                None
            }
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimals_fallback() {
        assert_eq!(Config::parse_decimals(None), 18);
        assert_eq!(Config::parse_decimals(Some("6")), 6);
        assert_eq!(Config::parse_decimals(Some("abc")), 18);
        assert_eq!(Config::parse_decimals(Some("0")), 18);
        assert_eq!(Config::parse_decimals(Some("40")), 18);
    }
}
