//! Economic rules: the fee schedule, reputation and voting-power formulas,
//! minting and reward parameters, and the pre-apply constraint check every
//! transaction passes before it may mutate the ledger.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ATTESTER_MIN_REPUTATION, BASE_FEE_SHELLS, FEE_MULTIPLIER_HIGH, FEE_MULTIPLIER_LOW,
    FEE_MULTIPLIER_NORMAL, MAX_AMOUNT_SHELLS, REGISTRATION_MINT_ATTESTED,
    REGISTRATION_MINT_UNATTESTED, REGISTRATION_STAKE_ATTESTED_SHELLS, REGISTRATION_STAKE_SHELLS,
    REPUTATION_DECAY_PER_MONTH, VALIDATOR_REWARD_PER_BLOCK, VOTING_POWER_CAP,
};
use crate::error::ClawError;
use crate::transaction::{Transaction, TxType};
use crate::types::Balance;

// ── Fees ─────────────────────────────────────────────────────────────────────

/// Fee priority chosen by the submitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FeePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Effective fee for a value-moving transfer: ceil(base × multiplier).
pub fn transfer_fee(priority: FeePriority) -> Balance {
    let multiplier = match priority {
        FeePriority::Low => FEE_MULTIPLIER_LOW,
        FeePriority::Normal => FEE_MULTIPLIER_NORMAL,
        FeePriority::High => FEE_MULTIPLIER_HIGH,
    };
    (BASE_FEE_SHELLS as f64 * multiplier).ceil() as Balance
}

/// Fee charged for a given transaction type at normal priority. Only the
/// value-moving types pay; mint, burn and stake are fee-free.
pub fn fee_for(tx_type: TxType) -> Balance {
    match tx_type {
        TxType::Transfer | TxType::SkillPurchase => transfer_fee(FeePriority::Normal),
        TxType::Mint | TxType::Burn | TxType::Stake | TxType::SkillCreate => 0,
    }
}

// ── Reputation ───────────────────────────────────────────────────────────────

/// Activity counters feeding the reputation formula.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationInputs {
    pub successful_trades: u64,
    pub skills_published: u64,
    pub uptime_hours: f64,
    pub governance_votes: u64,
    pub disputes_lost: u64,
    pub spam_flags: u64,
}

/// R = max(0, (10·trades + 20·skills + 0.1·uptime + 5·votes
///             − 50·disputes − 100·spam) × (1 − 0.01)^age_months)
pub fn reputation_score(inputs: &ReputationInputs, age_months: u32) -> f64 {
    let raw = 10.0 * inputs.successful_trades as f64
        + 20.0 * inputs.skills_published as f64
        + 0.1 * inputs.uptime_hours
        + 5.0 * inputs.governance_votes as f64
        - 50.0 * inputs.disputes_lost as f64
        - 100.0 * inputs.spam_flags as f64;
    let decay = (1.0 - REPUTATION_DECAY_PER_MONTH).powi(age_months as i32);
    (raw * decay).max(0.0)
}

/// Voting power: min(0.5·R + 0.001·shells_held, 1000).
pub fn voting_power(reputation: f64, shells_held: Balance) -> f64 {
    (0.5 * reputation + 0.001 * shells_held as f64).min(VOTING_POWER_CAP)
}

// ── Registration & rewards ───────────────────────────────────────────────────

/// Shells minted to a newly registered bot.
pub fn registration_mint(attested: bool) -> Balance {
    if attested {
        REGISTRATION_MINT_ATTESTED
    } else {
        REGISTRATION_MINT_UNATTESTED
    }
}

/// Stake required to register, with the attestation discount.
pub fn required_stake(attested: bool) -> Balance {
    if attested {
        REGISTRATION_STAKE_ATTESTED_SHELLS
    } else {
        REGISTRATION_STAKE_SHELLS
    }
}

/// Whether `reputation` qualifies its holder to attest for a registrant.
pub fn can_attest(reputation: f64) -> bool {
    reputation >= ATTESTER_MIN_REPUTATION
}

/// Split the per-block validator reward across `scores` proportionally to
/// participation; when every score is zero the reward splits equally.
/// Integer remainders go to the earliest validators so the full reward is
/// always distributed.
pub fn validator_rewards(scores: &[(String, u64)]) -> Vec<(String, Balance)> {
    if scores.is_empty() {
        return Vec::new();
    }
    let total: u64 = scores.iter().map(|(_, s)| s).sum();
    let n = scores.len() as u64;

    let mut shares: Vec<(String, Balance)> = if total == 0 {
        scores
            .iter()
            .map(|(id, _)| (id.clone(), VALIDATOR_REWARD_PER_BLOCK / n))
            .collect()
    } else {
        scores
            .iter()
            .map(|(id, s)| (id.clone(), VALIDATOR_REWARD_PER_BLOCK * s / total))
            .collect()
    };

    let distributed: Balance = shares.iter().map(|(_, a)| a).sum();
    let mut remainder = VALIDATOR_REWARD_PER_BLOCK - distributed;
    for share in shares.iter_mut() {
        if remainder == 0 {
            break;
        }
        share.1 += 1;
        remainder -= 1;
    }
    shares
}

// ── Pre-apply constraint check ───────────────────────────────────────────────

/// Economic validation run before any state mutation. `fee` is the fee the
/// ledger will burn for this transaction.
pub fn validate_economics(
    tx: &Transaction,
    sender_balance: Balance,
    fee: Balance,
) -> Result<(), ClawError> {
    if tx.amount > MAX_AMOUNT_SHELLS {
        return Err(ClawError::InvalidAmount(format!(
            "amount {} exceeds maximum {}",
            tx.amount, MAX_AMOUNT_SHELLS
        )));
    }
    if tx.tx_type == TxType::Transfer && tx.amount == 0 {
        return Err(ClawError::InvalidAmount(
            "transfer amount must be greater than zero".into(),
        ));
    }

    let need = match tx.tx_type {
        TxType::Transfer | TxType::SkillPurchase => tx.amount + fee,
        TxType::Burn | TxType::Stake => tx.amount,
        TxType::Mint | TxType::SkillCreate => 0,
    };
    if sender_balance < need {
        return Err(ClawError::InsufficientBalance {
            need,
            have: sender_balance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublicKey;

    fn tx(tx_type: TxType, amount: u64) -> Transaction {
        Transaction {
            version: 1,
            tx_type,
            from: PublicKey::from_bytes([1; 32]),
            to: Some(PublicKey::from_bytes([2; 32])),
            amount,
            nonce: 1,
            timestamp: 0,
            data: None,
            signature: None,
        }
    }

    #[test]
    fn fee_schedule_rounds_up() {
        assert_eq!(transfer_fee(FeePriority::Low), 1); // ceil(0.5)
        assert_eq!(transfer_fee(FeePriority::Normal), 1);
        assert_eq!(transfer_fee(FeePriority::High), 2);
    }

    #[test]
    fn reputation_penalties_floor_at_zero() {
        // 20 trades, 5 disputes lost, 2 spam flags, 1 month old:
        // (200 − 250 − 200) × 0.99 < 0 → floored to 0.
        let inputs = ReputationInputs {
            successful_trades: 20,
            disputes_lost: 5,
            spam_flags: 2,
            ..Default::default()
        };
        assert_eq!(reputation_score(&inputs, 1), 0.0);

        let positive_only = ReputationInputs {
            successful_trades: 20,
            ..Default::default()
        };
        assert!(reputation_score(&positive_only, 1) > 0.0);
    }

    #[test]
    fn reputation_decays_with_age() {
        let inputs = ReputationInputs {
            successful_trades: 10,
            ..Default::default()
        };
        let fresh = reputation_score(&inputs, 0);
        let aged = reputation_score(&inputs, 12);
        assert_eq!(fresh, 100.0);
        assert!(aged < fresh);
        assert!((aged - 100.0 * 0.99f64.powi(12)).abs() < 1e-9);
    }

    #[test]
    fn voting_power_is_capped() {
        assert_eq!(voting_power(10_000.0, 0), VOTING_POWER_CAP);
        assert!((voting_power(100.0, 1_000) - 51.0).abs() < 1e-9);
    }

    #[test]
    fn rewards_split_proportionally() {
        let out = validator_rewards(&[("a".into(), 3), ("b".into(), 1)]);
        let total: u64 = out.iter().map(|(_, a)| a).sum();
        assert_eq!(total, VALIDATOR_REWARD_PER_BLOCK);
        assert!(out[0].1 > out[1].1);
    }

    #[test]
    fn rewards_split_equally_when_scores_zero() {
        let out = validator_rewards(&[("a".into(), 0), ("b".into(), 0)]);
        assert_eq!(out[0].1, 5);
        assert_eq!(out[1].1, 5);
    }

    #[test]
    fn zero_transfer_rejected() {
        let err = validate_economics(&tx(TxType::Transfer, 0), 100, 1).unwrap_err();
        assert!(matches!(err, ClawError::InvalidAmount(_)));
    }

    #[test]
    fn amount_above_safe_bound_rejected() {
        let err =
            validate_economics(&tx(TxType::Transfer, MAX_AMOUNT_SHELLS + 1), u64::MAX, 1)
                .unwrap_err();
        assert!(matches!(err, ClawError::InvalidAmount(_)));
    }

    #[test]
    fn balance_must_cover_amount_plus_fee() {
        let err = validate_economics(&tx(TxType::Transfer, 100), 100, 1).unwrap_err();
        assert!(matches!(
            err,
            ClawError::InsufficientBalance { need: 101, have: 100 }
        ));
        validate_economics(&tx(TxType::Transfer, 100), 101, 1).unwrap();
    }

    #[test]
    fn mint_ignores_sender_balance() {
        validate_economics(&tx(TxType::Mint, 100), 0, 0).unwrap();
    }
}
