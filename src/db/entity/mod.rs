pub mod user;
pub mod user_wallet;
pub mod internal_wallet;
pub mod internal_balance;
pub mod ledger_entry;
pub mod withdraw_request;

pub use user::Entity as User;
pub use user_wallet::Entity as UserWallet;
pub use internal_wallet::Entity as InternalWallet;
pub use internal_balance::Entity as InternalBalance;
pub use ledger_entry::Entity as LedgerEntry;
pub use withdraw_request::Entity as WithdrawRequest;
