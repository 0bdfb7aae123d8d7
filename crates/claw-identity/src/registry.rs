use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use claw_core::constants::{
    ATTESTER_MIN_REPUTATION, MONTH_MS, REGISTRATION_STAKE_SHELLS, STAKE_LOCK_MS,
};
use claw_core::economics::{can_attest, reputation_score, required_stake, ReputationInputs};
use claw_core::error::ClawError;
use claw_core::types::{Balance, PublicKey, TimestampMs};
use claw_crypto::KeyPair;

// ── BotIdentity ──────────────────────────────────────────────────────────────

/// One registered (or registering) bot: its keypair, metadata, stake state,
/// attestations received, and the activity counters its reputation derives
/// from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BotIdentity {
    pub public_key: PublicKey,
    /// Hex-encoded Ed25519 secret key. Prototype custody: the registry file
    /// doubles as the wallet store.
    pub secret_key: String,
    pub name: String,
    pub description: String,
    pub created_at: TimestampMs,
    pub reputation: f64,
    pub stake_locked: Balance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_unlock_at: Option<TimestampMs>,
    /// Public keys of bots that attested for this one.
    pub attestations: Vec<PublicKey>,
    pub counters: ReputationInputs,
}

// ── Persistent state ─────────────────────────────────────────────────────────

/// `{version, bots, attestations}` — attestations maps an attester to the
/// bots it has vouched for (the outbound index; the inbound list lives on
/// each bot).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityState {
    pub version: u16,
    pub bots: BTreeMap<PublicKey, BotIdentity>,
    pub attestations: BTreeMap<PublicKey, Vec<PublicKey>>,
}

impl Default for IdentityState {
    fn default() -> Self {
        Self {
            version: claw_core::constants::STATE_FILE_VERSION,
            bots: BTreeMap::new(),
            attestations: BTreeMap::new(),
        }
    }
}

// ── IdentityRegistry ─────────────────────────────────────────────────────────

/// Registry of bot identities, persisted to `<data_dir>/identity.json` after
/// every mutation.
pub struct IdentityRegistry {
    path: PathBuf,
    state: IdentityState,
}

impl IdentityRegistry {
    pub fn open(data_dir: &Path) -> Result<Self, ClawError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| ClawError::Storage(format!("creating {}: {e}", data_dir.display())))?;
        let path = data_dir.join("identity.json");
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| ClawError::Storage(format!("reading {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| ClawError::Storage(format!("corrupt {}: {e}", path.display())))?
        } else {
            IdentityState::default()
        };
        Ok(Self { path, state })
    }

    fn persist(&self) -> Result<(), ClawError> {
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| ClawError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| ClawError::Storage(format!("writing {}: {e}", self.path.display())))?;
        Ok(())
    }

    // ── Wallets ──────────────────────────────────────────────────────────────

    /// Generate a fresh keypair and store the identity. Returns the keypair
    /// so the caller can sign immediately.
    pub fn create_wallet(
        &mut self,
        name: &str,
        description: &str,
        now_ms: TimestampMs,
    ) -> Result<KeyPair, ClawError> {
        let keypair = KeyPair::generate();
        let public_key = keypair.public_key();
        let identity = BotIdentity {
            public_key,
            secret_key: keypair.secret_hex(),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now_ms,
            reputation: 0.0,
            stake_locked: 0,
            stake_unlock_at: None,
            attestations: Vec::new(),
            counters: ReputationInputs::default(),
        };
        self.state.bots.insert(public_key, identity);
        self.persist()?;
        info!(bot = %public_key, name, "created wallet");
        Ok(keypair)
    }

    pub fn get_bot(&self, public_key: &PublicKey) -> Option<&BotIdentity> {
        self.state.bots.get(public_key)
    }

    pub fn list_bots(&self) -> impl Iterator<Item = &BotIdentity> {
        self.state.bots.values()
    }

    /// Rebuild the signing keypair for a stored identity.
    pub fn keypair_for(&self, public_key: &PublicKey) -> Result<KeyPair, ClawError> {
        let bot = self
            .get_bot(public_key)
            .ok_or_else(|| ClawError::UnknownBot(public_key.to_hex()))?;
        KeyPair::from_secret_hex(&bot.secret_key)
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Register a bot by locking stake for 30 days. An attestation from a
    /// bot with reputation ≥ 100 halves the stake requirement.
    pub fn register_bot(
        &mut self,
        public_key: &PublicKey,
        stake: Balance,
        attester: Option<PublicKey>,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        if !self.state.bots.contains_key(public_key) {
            return Err(ClawError::UnknownBot(public_key.to_hex()));
        }
        if self.is_registered(public_key, now_ms) {
            return Err(ClawError::AlreadyRegistered(public_key.to_hex()));
        }

        let attested = match attester {
            Some(att) => {
                let attester_bot = self
                    .state
                    .bots
                    .get(&att)
                    .ok_or_else(|| ClawError::UnknownBot(att.to_hex()))?;
                if !can_attest(attester_bot.reputation) {
                    return Err(ClawError::ReputationTooLow {
                        required: ATTESTER_MIN_REPUTATION as u32,
                        actual: attester_bot.reputation as u32,
                    });
                }
                true
            }
            None => false,
        };

        let required = required_stake(attested);
        if stake < required {
            return Err(ClawError::StakeRequired { required, got: stake });
        }

        let bot = self.state.bots.get_mut(public_key).expect("checked above");
        bot.stake_locked = stake;
        bot.stake_unlock_at = Some(now_ms + STAKE_LOCK_MS);
        if let Some(att) = attester {
            bot.attestations.push(att);
            self.state
                .attestations
                .entry(att)
                .or_default()
                .push(*public_key);
        }
        self.persist()?;
        info!(bot = %public_key, stake, attested, "registered bot");
        Ok(())
    }

    /// A bot counts as registered while its stake lock holds:
    /// stake ≥ 50 and the unlock time is still in the future.
    pub fn is_registered(&self, public_key: &PublicKey, now_ms: TimestampMs) -> bool {
        match self.state.bots.get(public_key) {
            Some(bot) => {
                bot.stake_locked >= REGISTRATION_STAKE_SHELLS
                    && bot.stake_unlock_at.map(|t| t > now_ms).unwrap_or(false)
            }
            None => false,
        }
    }

    /// Bots an attester has vouched for.
    pub fn attested_by(&self, attester: &PublicKey) -> &[PublicKey] {
        self.state
            .attestations
            .get(attester)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // ── Reputation ───────────────────────────────────────────────────────────

    /// Replace a bot's activity counters and recompute its reputation from
    /// them, decayed by account age in months.
    pub fn update_reputation(
        &mut self,
        public_key: &PublicKey,
        counters: ReputationInputs,
        now_ms: TimestampMs,
    ) -> Result<f64, ClawError> {
        let bot = self
            .state
            .bots
            .get_mut(public_key)
            .ok_or_else(|| ClawError::UnknownBot(public_key.to_hex()))?;
        let age_months = ((now_ms.saturating_sub(bot.created_at)) / MONTH_MS) as u32;
        bot.counters = counters;
        bot.reputation = reputation_score(&counters, age_months);
        let reputation = bot.reputation;
        self.persist()?;
        Ok(reputation)
    }

    /// Bump the successful-trade counter (called by the marketplace after a
    /// purchase settles).
    pub fn record_trade(
        &mut self,
        public_key: &PublicKey,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        let mut counters = self
            .state
            .bots
            .get(public_key)
            .ok_or_else(|| ClawError::UnknownBot(public_key.to_hex()))?
            .counters;
        counters.successful_trades += 1;
        self.update_reputation(public_key, counters, now_ms)?;
        Ok(())
    }

    /// Bump the published-skill counter (called on skill creation).
    pub fn record_skill_published(
        &mut self,
        public_key: &PublicKey,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        let mut counters = self
            .state
            .bots
            .get(public_key)
            .ok_or_else(|| ClawError::UnknownBot(public_key.to_hex()))?
            .counters;
        counters.skills_published += 1;
        self.update_reputation(public_key, counters, now_ms)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const NOW: u64 = 1_700_000_000_000;

    fn temp_registry(name: &str) -> (IdentityRegistry, PathBuf) {
        let dir = std::env::temp_dir().join(format!("claw_identity_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        (IdentityRegistry::open(&dir).unwrap(), dir)
    }

    #[test]
    fn create_wallet_persists_identity() {
        let (mut reg, dir) = temp_registry("wallet");
        let kp = reg.create_wallet("scraper", "web scraping bot", NOW).unwrap();
        let bot = reg.get_bot(&kp.public_key()).unwrap();
        assert_eq!(bot.name, "scraper");
        assert_eq!(bot.created_at, NOW);

        // Keypair restorable from the stored secret.
        let restored = reg.keypair_for(&kp.public_key()).unwrap();
        assert_eq!(restored.public_key(), kp.public_key());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn register_requires_minimum_stake() {
        let (mut reg, dir) = temp_registry("min_stake");
        let kp = reg.create_wallet("bot", "", NOW).unwrap();
        let err = reg
            .register_bot(&kp.public_key(), 10, None, NOW)
            .unwrap_err();
        assert!(matches!(err, ClawError::StakeRequired { required: 50, got: 10 }));

        reg.register_bot(&kp.public_key(), 50, None, NOW).unwrap();
        assert!(reg.is_registered(&kp.public_key(), NOW + 1));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn attestation_discounts_stake() {
        let (mut reg, dir) = temp_registry("attested");
        let attester = reg.create_wallet("elder", "", NOW).unwrap();
        let newcomer = reg.create_wallet("newcomer", "", NOW).unwrap();

        // Attester needs reputation ≥ 100 — 6 published skills gives 120.
        reg.update_reputation(
            &attester.public_key(),
            ReputationInputs { skills_published: 6, ..Default::default() },
            NOW,
        )
        .unwrap();

        // 25 shells suffice with the attestation.
        reg.register_bot(&newcomer.public_key(), 25, Some(attester.public_key()), NOW)
            .unwrap();

        let bot = reg.get_bot(&newcomer.public_key()).unwrap();
        assert_eq!(bot.attestations, vec![attester.public_key()]);
        assert_eq!(reg.attested_by(&attester.public_key()), &[newcomer.public_key()]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn low_reputation_attester_rejected() {
        let (mut reg, dir) = temp_registry("low_rep");
        let attester = reg.create_wallet("nobody", "", NOW).unwrap();
        let newcomer = reg.create_wallet("newcomer", "", NOW).unwrap();

        let err = reg
            .register_bot(&newcomer.public_key(), 25, Some(attester.public_key()), NOW)
            .unwrap_err();
        assert!(matches!(err, ClawError::ReputationTooLow { required: 100, .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn registration_expires_with_stake_lock() {
        let (mut reg, dir) = temp_registry("expiry");
        let kp = reg.create_wallet("bot", "", NOW).unwrap();
        reg.register_bot(&kp.public_key(), 50, None, NOW).unwrap();

        assert!(reg.is_registered(&kp.public_key(), NOW + STAKE_LOCK_MS - 1));
        assert!(!reg.is_registered(&kp.public_key(), NOW + STAKE_LOCK_MS));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reputation_uses_account_age() {
        let (mut reg, dir) = temp_registry("age");
        let kp = reg.create_wallet("bot", "", NOW).unwrap();
        let inputs = ReputationInputs { successful_trades: 10, ..Default::default() };

        // One month after creation: 100 × 0.99.
        let r = reg
            .update_reputation(&kp.public_key(), inputs, NOW + MONTH_MS)
            .unwrap();
        assert!((r - 99.0).abs() < 1e-9);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
