pub mod config;
pub mod enums;
pub mod error;
pub mod address;
pub mod ledger;
pub mod models;
pub mod store;
pub mod db;
pub mod notify;
pub mod services;
pub mod api;

pub use config::Config;
pub use enums::{ EntryType, TreasuryAlertLevel, WithdrawStatus };
pub use error::{ AppError, Result };
