//! claw-sdk — the embedding facade.
//!
//! Binds the identity registry, ledger engine, marketplace, and optionally a
//! consensus node into one object sharing a single data directory, plus the
//! seam to the external governance channel.

pub mod governance;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::info;

use claw_consensus::{ConsensusConfig, PbftNode};
use claw_core::economics::registration_mint;
use claw_core::error::ClawError;
use claw_core::transaction::{Transaction, TxType};
use claw_core::types::{Balance, PublicKey, TimestampMs, TxDigest};
use claw_crypto::KeyPair;
use claw_identity::IdentityRegistry;
use claw_ledger::{LedgerEngine, StoredTransaction};
use claw_market::Marketplace;

pub use governance::{GovernanceOracle, GovernanceProposal, GovernanceTally};
pub use claw_market::{SkillDraft, SkillFile};

// ── Configuration ────────────────────────────────────────────────────────────

/// Facade configuration. Two validator processes must never share a data
/// directory.
#[derive(Clone, Debug)]
pub struct SdkConfig {
    pub data_dir: PathBuf,
    /// When set, transactions route through PBFT instead of being applied
    /// directly.
    pub consensus: Option<ConsensusConfig>,
}

impl SdkConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), consensus: None }
    }

    pub fn with_consensus(mut self, consensus: ConsensusConfig) -> Self {
        self.consensus = Some(consensus);
        self
    }

    /// `$HOME/.clawrrency`, the default data directory.
    pub fn default_data_dir() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clawrrency")
    }
}

// ── Sdk ──────────────────────────────────────────────────────────────────────

/// One fully wired clawrrency node/embedding handle.
pub struct Sdk {
    pub identity: Arc<Mutex<IdentityRegistry>>,
    pub ledger: Arc<Mutex<LedgerEngine>>,
    pub market: Marketplace,
    pub consensus: Option<PbftNode>,
    governance: Option<Box<dyn GovernanceOracle>>,
}

impl Sdk {
    /// Construct every subsystem in dependency order: identity → ledger →
    /// marketplace → consensus. Corrupt persistent state aborts here.
    pub fn initialize(config: SdkConfig, now_ms: TimestampMs) -> Result<Self, ClawError> {
        let identity = Arc::new(Mutex::new(IdentityRegistry::open(&config.data_dir)?));
        let ledger = Arc::new(Mutex::new(LedgerEngine::open(&config.data_dir)?));
        let market = Marketplace::open(
            &config.data_dir,
            Arc::clone(&ledger),
            Some(Arc::clone(&identity)),
        )?;

        let consensus = match config.consensus {
            Some(cfg) => {
                // The validator's signing identity lives in the registry,
                // keyed by the node id; created on first start.
                let keypair = {
                    let mut reg = lock(&identity)?;
                    let existing = reg
                        .list_bots()
                        .find(|b| b.name == cfg.node_id)
                        .map(|b| b.public_key);
                    match existing {
                        Some(pk) => reg.keypair_for(&pk)?,
                        None => reg.create_wallet(&cfg.node_id, "validator identity", now_ms)?,
                    }
                };
                Some(PbftNode::new(cfg, keypair, Arc::clone(&ledger)))
            }
            None => None,
        };

        info!(data_dir = %config.data_dir.display(), consensus = consensus.is_some(), "sdk initialized");
        Ok(Self { identity, ledger, market, consensus, governance: None })
    }

    /// Attach an external governance channel implementation.
    pub fn set_governance_oracle(&mut self, oracle: Box<dyn GovernanceOracle>) {
        self.governance = Some(oracle);
    }

    pub fn governance_oracle(&mut self) -> Option<&mut Box<dyn GovernanceOracle>> {
        self.governance.as_mut()
    }

    // ── Wallets & registration ───────────────────────────────────────────────

    /// Create a wallet and its (empty) ledger account.
    pub fn create_wallet(
        &mut self,
        name: &str,
        description: &str,
        now_ms: TimestampMs,
    ) -> Result<PublicKey, ClawError> {
        let keypair = lock(&self.identity)?.create_wallet(name, description, now_ms)?;
        let public_key = keypair.public_key();
        lock(&self.ledger)?.create_account(public_key, 0, now_ms)?;
        Ok(public_key)
    }

    /// Register a bot: lock its stake in the registry, then mint the
    /// registration reward into its ledger account (100 shells attested,
    /// 50 otherwise) with a self-signed mint transaction.
    pub fn register_bot(
        &mut self,
        public_key: &PublicKey,
        stake: Balance,
        attester: Option<PublicKey>,
        now_ms: TimestampMs,
    ) -> Result<Balance, ClawError> {
        let attested = attester.is_some();
        lock(&self.identity)?.register_bot(public_key, stake, attester, now_ms)?;

        let reward = registration_mint(attested);
        let keypair = lock(&self.identity)?.keypair_for(public_key)?;
        let nonce = lock(&self.ledger)?
            .get_account(public_key)
            .ok_or_else(|| ClawError::UnknownSender(public_key.to_hex()))?
            .nonce
            + 1;
        let mut tx = Transaction {
            version: 1,
            tx_type: TxType::Mint,
            from: *public_key,
            to: Some(*public_key),
            amount: reward,
            nonce,
            timestamp: now_ms,
            data: None,
            signature: None,
        };
        keypair.sign_transaction(&mut tx)?;
        self.route_transaction(tx, now_ms)?;
        Ok(reward)
    }

    // ── Transfers ────────────────────────────────────────────────────────────

    /// Build, sign and route a transfer from a wallet held in the registry.
    pub fn transfer(
        &mut self,
        from: &PublicKey,
        to: &PublicKey,
        amount: Balance,
        now_ms: TimestampMs,
    ) -> Result<TxDigest, ClawError> {
        let keypair = lock(&self.identity)?.keypair_for(from)?;
        let nonce = lock(&self.ledger)?
            .get_account(from)
            .ok_or_else(|| ClawError::UnknownSender(from.to_hex()))?
            .nonce
            + 1;
        let mut tx = Transaction {
            version: 1,
            tx_type: TxType::Transfer,
            from: *from,
            to: Some(*to),
            amount,
            nonce,
            timestamp: now_ms,
            data: None,
            signature: None,
        };
        keypair.sign_transaction(&mut tx)?;
        self.route_transaction(tx, now_ms)
    }

    /// Through consensus when attached, straight to the ledger otherwise.
    fn route_transaction(
        &mut self,
        tx: Transaction,
        now_ms: TimestampMs,
    ) -> Result<TxDigest, ClawError> {
        match self.consensus.as_mut() {
            Some(node) => node.submit_transaction(tx, now_ms),
            None => lock(&self.ledger)?.apply_transaction(&tx, now_ms),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn balance(&self, public_key: &PublicKey) -> Result<Balance, ClawError> {
        Ok(lock(&self.ledger)?.get_balance(public_key))
    }

    pub fn history(
        &self,
        public_key: &PublicKey,
        limit: usize,
    ) -> Result<Vec<StoredTransaction>, ClawError> {
        Ok(lock(&self.ledger)?
            .get_transaction_history(public_key, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn reputation(&self, public_key: &PublicKey) -> Result<f64, ClawError> {
        lock(&self.identity)?
            .get_bot(public_key)
            .map(|b| b.reputation)
            .ok_or_else(|| ClawError::UnknownBot(public_key.to_hex()))
    }
}

fn lock<T>(mutex: &Arc<Mutex<T>>) -> Result<std::sync::MutexGuard<'_, T>, ClawError> {
    mutex
        .lock()
        .map_err(|_| ClawError::Storage("lock poisoned".into()))
}
