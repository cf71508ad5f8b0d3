pub mod identity_service;
pub mod balance_service;
pub mod admin_service;
pub mod withdrawal_service;
pub mod treasury_service;
pub mod report_service;

pub use identity_service::{ IdentityService, ResolvedIdentity, Session };
pub use balance_service::{ BalanceService, Snapshot };
pub use admin_service::{ AdminAdjustment, AdminService };
pub use withdrawal_service::{ CreateWithdrawal, WithdrawalService };
pub use treasury_service::{ TreasuryReport, TreasuryService };
