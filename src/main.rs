use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use internal_ledger::{
    api::{ self, AppState },
    db::{ self, PgLedgerStore },
    notify::{ LogNotifier, NotificationDispatcher, Notifier, TelegramNotifier },
    store::LedgerStore,
    Config,
};
use migration::{ Migrator, MigratorTrait };
use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "internal_ledger=debug,tower_http=debug".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .context("Failed to load configuration")?;

    tracing::info!(
        token = %config.token.symbol,
        decimals = config.token.decimals,
        admin_enabled = config.admin_secret.is_some(),
        daily_limit = ?config.withdraw.daily_limit,
        monthly_limit = ?config.withdraw.monthly_limit,
        blocked_addresses = config.withdraw.blocked_addresses.len(),
        "Starting internal ledger"
    );

    // Initialize database connection
    let db = db::connect(&config.database).await.context("Failed to connect to database")?;

    // Run migrations
    Migrator::up(&db, None).await.context("Failed to run migrations")?;
    tracing::info!("Migrations completed successfully");

    // Admin alert channel
    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) => {
            tracing::info!(chat_id = telegram.admin_chat_id, "Telegram admin alerts enabled");
            Arc::new(TelegramNotifier::new(telegram))
        }
        None => {
            tracing::info!("Telegram not configured; admin alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let (notifications, notification_worker) = NotificationDispatcher::spawn(notifier);

    let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(db.clone()));
    let app = api::router(AppState::from_config(&config, store, notifications));

    // Start server
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener
        ::bind(&addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal()).await
        .context("Server error")?;

    // The router and its dispatcher clones are gone; give queued alerts a moment to drain.
    match tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, notification_worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Notification worker ended abnormally"),
        Err(_) => tracing::warn!("Notification worker did not drain before shutdown"),
    }

    db.close().await.context("Failed to close database pool")?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
