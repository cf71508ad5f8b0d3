use std::collections::HashSet;

use ethers::core::types::H160;

use crate::error::{ AppError, Result };

/// Format-only EVM address check: `0x` followed by 40 hex characters.
pub fn validate_address(address: &str) -> bool {
    address.len() == 42 && address.starts_with("0x") && address[2..].parse::<H160>().is_ok()
}

/// Canonical (lowercase) form used for every lookup and every stored address.
pub fn normalize_address(address: &str) -> Option<String> {
    let address = address.trim();
    validate_address(address).then(|| address.to_lowercase())
}

pub fn normalize_wallet(address: &str) -> Result<String> {
    normalize_address(address).ok_or(AppError::InvalidWallet)
}

/// Parse a comma-separated blocklist. Entries that are not addresses are skipped.
pub fn parse_address_list(raw: &str) -> HashSet<String> {
    raw.split(',').filter_map(normalize_address).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0"));
        assert!(!validate_address("742d35Cc6634C0532925a3b844Bc9e7595f0bEb0"));
        assert!(!validate_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbZ"));
        assert!(!validate_address("invalid"));
        assert!(!validate_address("0x123"));
    }

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(
            normalize_address(" 0xABCDEF0123456789000000000000000000000001 ").as_deref(),
            Some("0xabcdef0123456789000000000000000000000001")
        );
        assert!(matches!(normalize_wallet("0xnope"), Err(AppError::InvalidWallet)));
    }

    #[test]
    fn test_parse_address_list() {
        let list = parse_address_list(
            "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA, junk,,0x0000000000000000000000000000000000000001"
        );
        assert_eq!(list.len(), 2);
        assert!(list.contains("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
    }
}
