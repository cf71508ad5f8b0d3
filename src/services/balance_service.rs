use std::sync::Arc;

use uuid::Uuid;

use crate::address::normalize_address;
use crate::config::TokenConfig;
use crate::enums::EntryType;
use crate::error::{ AppError, Result };
use crate::ledger::amount::ensure_positive;
use crate::models::{ InternalBalance, InternalWallet, LedgerEntry, LedgerMutation, NewLedgerEntry };
use crate::services::identity_service::ResolvedIdentity;
use crate::store::LedgerStore;

/// Read-only composite view of one wallet.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub token_symbol: String,
    pub decimals: u32,
    pub wallet: InternalWallet,
    pub balance: InternalBalance,
    /// Newest first.
    pub ledger: Vec<LedgerEntry>,
}

/// Materialized balance compared against the ledger it caches.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub wallet_id: Uuid,
    pub balance: i128,
    pub ledger_sum: i128,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.ledger_sum
    }
}

pub struct BalanceService {
    store: Arc<dyn LedgerStore>,
    token: TokenConfig,
    recent_entries: u64,
}

impl BalanceService {
    pub fn new(store: Arc<dyn LedgerStore>, token: TokenConfig, recent_entries: u64) -> Self {
        Self {
            store,
            token,
            recent_entries,
        }
    }

    pub fn token(&self) -> &TokenConfig {
        &self.token
    }

    /// Lazily create the user's internal wallet and refresh its cached address.
    pub async fn ensure_wallet(
        &self,
        user_id: Uuid,
        wallet_address: Option<&str>
    ) -> Result<InternalWallet> {
        let wallet = self.store.get_or_create_wallet(user_id).await?;

        match wallet_address {
            Some(address) if wallet.wallet_address.as_deref() != Some(address) => {
                self.store.set_wallet_address(wallet.id, address).await
            }
            _ => Ok(wallet),
        }
    }

    /// Set or clear the address withdrawals fall back to when none is given.
    pub async fn set_default_withdraw_address(
        &self,
        identity: &ResolvedIdentity,
        address: Option<&str>
    ) -> Result<InternalWallet> {
        let address = match address.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(normalize_address(raw).ok_or(AppError::DestinationInvalid)?),
            None => None,
        };

        let wallet = self.ensure_wallet(identity.user_id, identity.wallet_address.as_deref()).await?;
        let wallet = self.store.set_default_withdraw_address(wallet.id, address.as_deref()).await?;

        tracing::info!(
            user_id = %identity.user_id,
            wallet_id = %wallet.id,
            default_withdraw_address = wallet.default_withdraw_address.as_deref().unwrap_or("-"),
            "Default withdraw address updated"
        );
        Ok(wallet)
    }

    pub async fn snapshot(&self, identity: &ResolvedIdentity) -> Result<Snapshot> {
        let wallet = self.ensure_wallet(identity.user_id, identity.wallet_address.as_deref()).await?;
        self.snapshot_of(wallet).await
    }

    pub async fn snapshot_of(&self, wallet: InternalWallet) -> Result<Snapshot> {
        let balance = self.store.get_balance(wallet.id).await?;
        let ledger = self.store.recent_ledger(wallet.id, self.recent_entries).await?;

        Ok(Snapshot {
            token_symbol: self.token.symbol.clone(),
            decimals: self.token.decimals,
            wallet,
            balance,
            ledger,
        })
    }

    /// Post one ledger entry and update the materialized balance atomically.
    pub async fn apply_entry(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation> {
        ensure_positive(entry.amount)?;
        if !entry.token_symbol.eq_ignore_ascii_case(&self.token.symbol) {
            return Err(AppError::TokenMismatch(entry.token_symbol));
        }

        let entry_type = entry.entry_type;
        let amount = entry.amount;
        let actor = entry.created_by.clone();

        match self.store.apply_entry(wallet_id, entry).await {
            Ok(mutation) => {
                tracing::info!(
                    %wallet_id,
                    entry_type = %entry_type,
                    amount = %amount,
                    actor = actor.as_deref().unwrap_or("-"),
                    balance = %mutation.balance.balance,
                    "Ledger entry applied"
                );
                Ok(mutation)
            }
            Err(e @ AppError::InsufficientFunds) => {
                tracing::warn!(%wallet_id, entry_type = %entry_type, amount = %amount, "Ledger entry rejected: insufficient funds");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn credit(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation> {
        self.apply_entry(wallet_id, NewLedgerEntry { entry_type: EntryType::Credit, ..entry }).await
    }

    pub async fn debit(&self, wallet_id: Uuid, entry: NewLedgerEntry) -> Result<LedgerMutation> {
        self.apply_entry(wallet_id, NewLedgerEntry { entry_type: EntryType::Debit, ..entry }).await
    }

    /// Compare the cached balance with the sum of its ledger entries.
    pub async fn reconcile(&self, wallet_id: Uuid) -> Result<Reconciliation> {
        let balance = self.store.get_balance(wallet_id).await?;
        let ledger_sum = self.store.ledger_sum(wallet_id).await?;

        let report = Reconciliation {
            wallet_id,
            balance: balance.balance,
            ledger_sum,
        };
        if !report.is_consistent() {
            tracing::error!(%wallet_id, balance = %report.balance, ledger_sum = %report.ledger_sum, "Balance diverged from ledger");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use crate::models::NewWalletUser;

    const WALLET: &str = "0xabcdef0123456789000000000000000000000001";

    async fn setup() -> (BalanceService, ResolvedIdentity) {
        let store = Arc::new(MemoryLedgerStore::new());
        let registered = store
            .register_wallet_user(NewWalletUser {
                wallet_address: WALLET.to_string(),
                email: None,
                name: None,
            }).await
            .unwrap();
        let service = BalanceService::new(store, TokenConfig::default(), 50);
        let identity = ResolvedIdentity {
            user_id: registered.user.id,
            wallet_address: Some(WALLET.to_string()),
        };
        (service, identity)
    }

    fn entry(amount: i128) -> NewLedgerEntry {
        NewLedgerEntry {
            entry_type: EntryType::Credit,
            amount,
            token_symbol: "TKN".to_string(),
            reference: None,
            metadata: None,
            created_by: Some("system".to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_snapshot_is_empty() {
        let (service, identity) = setup().await;

        let snapshot = service.snapshot(&identity).await.unwrap();

        assert_eq!(snapshot.balance.balance, 0);
        assert_eq!(snapshot.balance.locked_amount, 0);
        assert!(snapshot.ledger.is_empty());
        assert_eq!(snapshot.wallet.wallet_address.as_deref(), Some(WALLET));
    }

    #[tokio::test]
    async fn test_credit_debit_and_reconcile() {
        let (service, identity) = setup().await;
        let wallet = service.ensure_wallet(identity.user_id, None).await.unwrap();

        service.credit(wallet.id, entry(100)).await.unwrap();
        let mutation = service.debit(wallet.id, entry(30)).await.unwrap();

        assert_eq!(mutation.balance.balance, 70);
        assert_eq!(mutation.entry.amount, -30);

        let report = service.reconcile(wallet.id).await.unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.ledger_sum, 70);
    }

    #[tokio::test]
    async fn test_debit_beyond_balance_is_rejected() {
        let (service, identity) = setup().await;
        let wallet = service.ensure_wallet(identity.user_id, None).await.unwrap();

        service.credit(wallet.id, entry(10)).await.unwrap();
        let err = service.debit(wallet.id, entry(11)).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientFunds));
        assert_eq!(service.snapshot_of(wallet).await.unwrap().ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_and_foreign_token_rejected() {
        let (service, identity) = setup().await;
        let wallet = service.ensure_wallet(identity.user_id, None).await.unwrap();

        let err = service.credit(wallet.id, entry(0)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));

        let foreign = NewLedgerEntry { token_symbol: "USDT".to_string(), ..entry(1) };
        let err = service.credit(wallet.id, foreign).await.unwrap_err();
        assert!(matches!(err, AppError::TokenMismatch(_)));
    }

    #[tokio::test]
    async fn test_default_withdraw_address() {
        let (service, identity) = setup().await;

        let err = service.set_default_withdraw_address(&identity, Some("0x12")).await.unwrap_err();
        assert!(matches!(err, AppError::DestinationInvalid));

        let wallet = service
            .set_default_withdraw_address(&identity, Some("0x1111111111111111111111111111111111111AbC")).await
            .unwrap();
        assert_eq!(
            wallet.default_withdraw_address.as_deref(),
            Some("0x1111111111111111111111111111111111111abc")
        );

        let wallet = service.set_default_withdraw_address(&identity, Some("  ")).await.unwrap();
        assert_eq!(wallet.default_withdraw_address, None);
    }
}
