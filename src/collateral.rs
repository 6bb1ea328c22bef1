// ============================================================================
// Collateral Vault - Sportsbook Settlement Core
// ============================================================================
//
// In-process fungible-token ledger backing the liquidity pool. Real token
// transfer/approval mechanics live outside this core; every component in here
// moves collateral exclusively through this vault so the books stay auditable
// from a single place.
//
// Accounting Convention:
//   - All internal balances are 18-decimal-normalized amounts held as f64
//     whole-token units.
//   - Collateral with fewer on-token decimals (e.g. 6-decimal stables) is
//     normalized through `to_internal` / `from_internal` at the boundary.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Aggregate account holding every round's pool balance
pub const POOL_ACCOUNT: &str = "pool";

/// Protocol fee-capture account (trade fees, cancellation fees, round profit
/// cut, forfeited expired tickets)
pub const SAFE_BOX_ACCOUNT: &str = "safe_box";

/// Standing backstop that funds next-round and cross-round tickets
pub const DEFAULT_PROVIDER_ACCOUNT: &str = "default_liquidity_provider";

/// Normalize a raw smallest-unit token amount into internal whole-token units.
pub fn to_internal(raw_units: u128, decimals: u32) -> f64 {
    raw_units as f64 / 10f64.powi(decimals as i32)
}

/// Denormalize an internal amount back into raw smallest-unit token amounts.
pub fn from_internal(amount: f64, decimals: u32) -> u128 {
    (amount * 10f64.powi(decimals as i32)).round() as u128
}

/// Derive a deterministic escrow address for a ticket.
pub fn escrow_address(ticket_id: &str) -> String {
    let digest = Sha256::digest(ticket_id.as_bytes());
    format!("escrow_{}", &hex::encode(digest)[..16])
}

#[derive(Debug, Clone)]
pub enum VaultError {
    InsufficientBalance {
        account: String,
        requested: f64,
        available: f64,
    },
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultError::InsufficientBalance {
                account,
                requested,
                available,
            } => write!(
                f,
                "Insufficient balance on {}: requested {} but only {} available",
                account, requested, available
            ),
        }
    }
}

impl std::error::Error for VaultError {}

/// The collateral vault: account -> internal balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralVault {
    pub symbol: String,
    pub decimals: u32,
    balances: HashMap<String, f64>,
}

impl CollateralVault {
    pub fn new(symbol: &str, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            balances: HashMap::new(),
        }
    }

    pub fn balance_of(&self, account: &str) -> f64 {
        self.balances.get(account).copied().unwrap_or(0.0)
    }

    /// Credit an account out of thin air. Stands in for an inbound token
    /// transfer from outside the settlement core.
    pub fn mint(&mut self, account: &str, amount: f64) {
        *self.balances.entry(account.to_string()).or_insert(0.0) += amount;
    }

    pub fn transfer(&mut self, from: &str, to: &str, amount: f64) -> Result<(), VaultError> {
        if amount <= 0.0 {
            return Ok(());
        }
        let available = self.balance_of(from);
        // Epsilon absorbs f64 rounding on drain-to-zero transfers
        if available + 1e-9 < amount {
            return Err(VaultError::InsufficientBalance {
                account: from.to_string(),
                requested: amount,
                available,
            });
        }
        *self.balances.get_mut(from).unwrap() -= amount;
        *self.balances.entry(to.to_string()).or_insert(0.0) += amount;
        Ok(())
    }

    /// Drain an account completely, returning the amount moved.
    pub fn drain(&mut self, from: &str, to: &str) -> f64 {
        let amount = self.balance_of(from);
        if amount > 0.0 {
            *self.balances.get_mut(from).unwrap() = 0.0;
            *self.balances.entry(to.to_string()).or_insert(0.0) += amount;
        }
        amount
    }

    pub fn total_supply(&self) -> f64 {
        self.balances.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_and_balance() {
        let mut vault = CollateralVault::new("USDx", 18);
        vault.mint("alice", 100.0);

        vault.transfer("alice", "bob", 40.0).unwrap();
        assert_eq!(vault.balance_of("alice"), 60.0);
        assert_eq!(vault.balance_of("bob"), 40.0);
        assert_eq!(vault.total_supply(), 100.0);
    }

    #[test]
    fn test_transfer_rejects_overdraw() {
        let mut vault = CollateralVault::new("USDx", 18);
        vault.mint("alice", 10.0);

        let result = vault.transfer("alice", "bob", 10.5);
        assert!(result.is_err());
        assert_eq!(vault.balance_of("alice"), 10.0);
        assert_eq!(vault.balance_of("bob"), 0.0);
    }

    #[test]
    fn test_drain() {
        let mut vault = CollateralVault::new("USDx", 18);
        vault.mint("escrow_abc", 20.0);

        let moved = vault.drain("escrow_abc", SAFE_BOX_ACCOUNT);
        assert_eq!(moved, 20.0);
        assert_eq!(vault.balance_of("escrow_abc"), 0.0);
        assert_eq!(vault.balance_of(SAFE_BOX_ACCOUNT), 20.0);
    }

    #[test]
    fn test_decimal_normalization() {
        // 6-decimal stablecoin: 1_500_000 raw units = 1.5 internal
        assert_eq!(to_internal(1_500_000, 6), 1.5);
        assert_eq!(from_internal(1.5, 6), 1_500_000);

        // 18 decimals round-trips whole units
        assert_eq!(to_internal(2_000_000_000_000_000_000, 18), 2.0);
        assert_eq!(from_internal(2.0, 18), 2_000_000_000_000_000_000);
    }

    #[test]
    fn test_escrow_address_is_deterministic() {
        let a = escrow_address("ticket_1");
        let b = escrow_address("ticket_1");
        let c = escrow_address("ticket_2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("escrow_"));
    }
}
