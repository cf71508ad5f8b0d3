#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{ body::Body, http::{ Request, StatusCode }, Router };
use internal_ledger::{
    api::{ self, AppState },
    config::{ DatabaseConfig, TokenConfig, TreasuryThresholds, WithdrawPolicy },
    notify::NotificationDispatcher,
    store::{ LedgerStore, MemoryLedgerStore },
    Config,
};
use tower::util::ServiceExt;

pub const ADMIN_SECRET: &str = "test-admin-secret";
pub const WALLET: &str = "0xABCDEF0123456789000000000000000000000001";
pub const DESTINATION: &str = "0x1111111111111111111111111111111111111111";

/// `value` whole tokens at 18 decimals.
pub fn tokens(value: i128) -> i128 {
    value * 10i128.pow(18)
}

pub fn test_config() -> Config {
    Config {
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(1),
        },
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        admin_secret: Some(ADMIN_SECRET.to_string()),
        token: TokenConfig::default(),
        withdraw: WithdrawPolicy::default(),
        recent_ledger_entries: 50,
        telegram: None,
        treasury: TreasuryThresholds::default(),
    }
}

pub fn with_blocklist(mut config: Config, addresses: &[&str]) -> Config {
    config.withdraw.blocked_addresses = addresses
        .iter()
        .map(|a| a.to_lowercase())
        .collect::<HashSet<_>>();
    config
}

pub struct TestApp {
    pub store: Arc<MemoryLedgerStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let dyn_store: Arc<dyn LedgerStore> = store.clone();
        let state = AppState::from_config(&config, dyn_store, NotificationDispatcher::disabled());
        Self { store, state }
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let (status, body) = self.send(request).await;
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn admin(mut request: Request<Body>) -> Request<Body> {
    request.headers_mut().insert("x-internal-admin-token", ADMIN_SECRET.parse().unwrap());
    request
}
