pub mod amount;
pub mod balance;
pub mod withdrawal;

pub use amount::{ format_display, format_units, parse_minor, parse_units, MAX_AMOUNT_MINOR };
pub use balance::BalanceState;
pub use withdrawal::{ transition_effect, LockEffect };
