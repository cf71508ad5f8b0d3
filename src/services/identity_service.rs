use std::sync::Arc;

use uuid::Uuid;

use crate::address::{ normalize_address, normalize_wallet };
use crate::error::{ AppError, Result };
use crate::models::{ NewWalletUser, RegisteredUser };
use crate::store::LedgerStore;

/// Identity forwarded by the authenticating gateway.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user_id: Option<Uuid>,
    pub wallet_address: Option<String>,
}

/// Canonical identity a request acts as.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    pub user_id: Uuid,
    /// Normalized wallet address proven to belong to `user_id`, if any.
    pub wallet_address: Option<String>,
}

pub struct IdentityService {
    store: Arc<dyn LedgerStore>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Resolve the caller of a user-facing read or withdrawal.
    ///
    /// The session identity wins over a conflicting wallet hint. A wallet
    /// without a session must already be registered; this path never
    /// creates users.
    pub async fn resolve(
        &self,
        session: &Session,
        wallet_hint: Option<&str>
    ) -> Result<ResolvedIdentity> {
        let hint = match wallet_hint.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(normalize_wallet(raw)?),
            None => None,
        };

        let session_wallet = session.wallet_address.as_deref().and_then(|raw| {
            let normalized = normalize_address(raw);
            if normalized.is_none() {
                tracing::warn!(wallet = raw, "Ignoring malformed session wallet address");
            }
            normalized
        });

        match session.user_id {
            Some(user_id) => {
                if self.store.find_user(user_id).await?.is_none() {
                    return Err(AppError::UserNotFound);
                }

                let wallet_address = match (session_wallet, hint) {
                    (Some(wallet), _) => self.claim_session_wallet(user_id, wallet).await?,
                    (None, Some(wallet)) => self.owned_by(user_id, wallet).await?,
                    (None, None) => None,
                };

                Ok(ResolvedIdentity { user_id, wallet_address })
            }
            None => {
                let wallet = session_wallet.or(hint).ok_or(AppError::AuthRequired)?;
                let owner = self.store
                    .find_user_by_wallet(&wallet).await?
                    .ok_or(AppError::UserNotFound)?;

                Ok(ResolvedIdentity {
                    user_id: owner.id,
                    wallet_address: Some(wallet),
                })
            }
        }
    }

    /// Resolve the target of an admin mutation. Never creates anything.
    pub async fn resolve_target(
        &self,
        user_id: Option<Uuid>,
        wallet_address: Option<&str>
    ) -> Result<ResolvedIdentity> {
        let wallet = match wallet_address.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(normalize_wallet(raw)?),
            None => None,
        };

        match (user_id, wallet) {
            (Some(user_id), wallet) => {
                if self.store.find_user(user_id).await?.is_none() {
                    return Err(AppError::UserNotFound);
                }
                let wallet_address = match wallet {
                    Some(wallet) => self.owned_by(user_id, wallet).await?,
                    None => None,
                };
                Ok(ResolvedIdentity { user_id, wallet_address })
            }
            (None, Some(wallet)) => {
                let owner = self.store
                    .find_user_by_wallet(&wallet).await?
                    .ok_or(AppError::UserNotFound)?;
                Ok(ResolvedIdentity {
                    user_id: owner.id,
                    wallet_address: Some(wallet),
                })
            }
            (None, None) =>
                Err(AppError::InvalidInput("userId or walletAddress is required".to_string())),
        }
    }

    /// Explicit registration path: creates the user on first sight of the wallet.
    pub async fn register_wallet(
        &self,
        wallet_address: &str,
        email: Option<&str>,
        name: Option<&str>
    ) -> Result<RegisteredUser> {
        let wallet_address = normalize_wallet(wallet_address)?;

        let email = match email.map(str::trim).filter(|s| !s.is_empty()) {
            Some(email) if is_valid_email(email) => Some(email.to_lowercase()),
            Some(_) => {
                return Err(AppError::InvalidInput("Invalid email address".to_string()));
            }
            None => None,
        };
        let name = name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let registered = self.store.register_wallet_user(NewWalletUser {
            wallet_address: wallet_address.clone(),
            email,
            name,
        }).await?;

        tracing::info!(
            user_id = %registered.user.id,
            wallet = %wallet_address,
            is_new_user = registered.is_new_user,
            linked_existing_account = registered.linked_existing_account,
            "Wallet registered"
        );

        Ok(registered)
    }

    /// The gateway vouches for the session wallet, so an unowned one is linked.
    async fn claim_session_wallet(&self, user_id: Uuid, wallet: String) -> Result<Option<String>> {
        let owner = self.store.link_wallet(user_id, &wallet).await?;
        if owner == user_id {
            Ok(Some(wallet))
        } else {
            tracing::warn!(
                %user_id,
                %owner,
                wallet = %wallet,
                "Session wallet belongs to another user; using session identity"
            );
            Ok(None)
        }
    }

    async fn owned_by(&self, user_id: Uuid, wallet: String) -> Result<Option<String>> {
        match self.store.find_user_by_wallet(&wallet).await? {
            Some(owner) if owner.id == user_id => Ok(Some(wallet)),
            Some(owner) => {
                tracing::warn!(
                    %user_id,
                    owner = %owner.id,
                    wallet = %wallet,
                    "Wallet hint belongs to another user; using session identity"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// `local@domain.tld` with no whitespace.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
