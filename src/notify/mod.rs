//! Admin alerting channel.
//!
//! Business operations never wait on delivery: they hand an
//! [`AdminNotification`] to the [`NotificationDispatcher`], whose worker task
//! forwards it to the configured [`Notifier`]. Delivery failures are logged
//! and dropped, as are alerts that arrive while the queue is full.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::TelegramConfig;
use crate::enums::TreasuryAlertLevel;
use crate::error::{ AppError, Result };

/// Alerts buffered while the notifier is slow or unreachable.
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum AdminNotification {
    NewWithdrawal {
        request_id: Uuid,
        wallet_address: Option<String>,
        destination_address: String,
        /// Human-readable amount, already formatted with the token decimals.
        amount: String,
        token_symbol: String,
    },
    TreasuryBalance {
        level: TreasuryAlertLevel,
        treasury_address: Option<String>,
        current_balance: String,
        threshold: String,
        token_symbol: String,
    },
}

impl AdminNotification {
    pub fn render(&self) -> String {
        match self {
            AdminNotification::NewWithdrawal {
                request_id,
                wallet_address,
                destination_address,
                amount,
                token_symbol,
            } => {
                format!(
                    "💸 New withdrawal request\n\n\
                    ID: {id}\n\
                    Wallet: {wallet}\n\
                    Destination: {destination}\n\
                    Amount: {amount} {symbol}",
                    id = request_id,
                    wallet = wallet_address.as_deref().unwrap_or("-"),
                    destination = destination_address,
                    amount = amount,
                    symbol = token_symbol
                )
            }
            AdminNotification::TreasuryBalance {
                level,
                treasury_address,
                current_balance,
                threshold,
                token_symbol,
            } => {
                let emoji = match level {
                    TreasuryAlertLevel::Critical => "🚨",
                    TreasuryAlertLevel::Low => "⚠️",
                };
                format!(
                    "{emoji} Treasury balance {level}\n\n\
                    Address: {address}\n\
                    Balance: {balance} {symbol}\n\
                    Threshold: {threshold} {symbol}",
                    emoji = emoji,
                    level = level.as_str().to_uppercase(),
                    address = treasury_address.as_deref().unwrap_or("-"),
                    balance = current_balance,
                    threshold = threshold,
                    symbol = token_symbol
                )
            }
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &AdminNotification) -> Result<()>;
}

/// Sends alerts to the admin chat through the Telegram bot API.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            bot: Bot::new(config.bot_token.clone()),
            chat_id: ChatId(config.admin_chat_id),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, notification: &AdminNotification) -> Result<()> {
        self.bot
            .send_message(self.chat_id, notification.render()).await
            .map_err(|e| AppError::Internal(format!("telegram delivery failed: {}", e)))?;
        Ok(())
    }
}

/// Used when no admin chat is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &AdminNotification) -> Result<()> {
        tracing::info!(notification = ?notification, "Admin notification (no channel configured)");
        Ok(())
    }
}

/// Fire-and-forget front of the notifier.
#[derive(Clone)]
pub struct NotificationDispatcher {
    /// `None` when alerts are disabled.
    sender: Option<mpsc::Sender<AdminNotification>>,
}

impl NotificationDispatcher {
    /// Spawn the delivery worker. The worker exits once every dispatcher clone is dropped.
    pub fn spawn(notifier: Arc<dyn Notifier>) -> (Self, JoinHandle<()>) {
        Self::with_capacity(notifier, NOTIFICATION_QUEUE_CAPACITY)
    }

    pub fn with_capacity(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<AdminNotification>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                if let Err(e) = notifier.notify(&notification).await {
                    tracing::warn!(error = %e, "Failed to deliver admin notification");
                }
            }
            tracing::debug!("Notification worker stopped");
        });

        (Self { sender: Some(sender) }, worker)
    }

    /// Dispatcher that drops every message.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Never waits: a full queue drops the alert.
    pub fn dispatch(&self, notification: AdminNotification) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(notification = ?dropped, "Notification queue full; dropping admin notification");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Notification worker is gone; dropping admin notification");
            }
        }
    }
}
