//! Ledger account state.
//!
//! An account is keyed by its Ed25519 public key. The spendable balance and
//! the stake lock are held separately: stake never counts toward spendable
//! funds until it unlocks.

use serde::{Deserialize, Serialize};

use crate::types::{Balance, Nonce, PublicKey, TimestampMs};

/// Full on-ledger state of one account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub public_key: PublicKey,

    /// Spendable shells. Never negative by construction (u64).
    pub balance: Balance,

    /// Last consumed nonce; the next accepted transaction must carry
    /// `nonce + 1`.
    pub nonce: Nonce,

    /// Derived reputation score; recomputed by the identity registry.
    pub reputation: f64,

    pub created_at: TimestampMs,
    pub last_active: TimestampMs,

    /// Shells held outside the spendable balance as registration stake.
    pub stake_locked: Balance,

    /// When the stake lock expires; absent while nothing is staked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_unlock_at: Option<TimestampMs>,
}

impl Account {
    pub fn new(public_key: PublicKey, balance: Balance, now_ms: TimestampMs) -> Self {
        Self {
            public_key,
            balance,
            nonce: 0,
            reputation: 0.0,
            created_at: now_ms,
            last_active: now_ms,
            stake_locked: 0,
            stake_unlock_at: None,
        }
    }

    /// Spendable plus staked holdings.
    pub fn total_holdings(&self) -> Balance {
        self.balance + self.stake_locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_at_nonce_zero() {
        let acc = Account::new(PublicKey::from_bytes([9; 32]), 1_000, 5);
        assert_eq!(acc.nonce, 0);
        assert_eq!(acc.balance, 1_000);
        assert_eq!(acc.stake_locked, 0);
        assert!(acc.stake_unlock_at.is_none());
    }

    #[test]
    fn total_holdings_includes_stake() {
        let mut acc = Account::new(PublicKey::from_bytes([9; 32]), 100, 0);
        acc.stake_locked = 50;
        assert_eq!(acc.total_holdings(), 150);
    }
}
