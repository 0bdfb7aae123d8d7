use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use claw_core::account::Account;
use claw_core::constants::STAKE_LOCK_MS;
use claw_core::economics::{fee_for, validate_economics};
use claw_core::error::ClawError;
use claw_core::transaction::{Transaction, TxType};
use claw_core::types::{Balance, PublicKey, TimestampMs, TxDigest};
use claw_crypto::{tx_digest, verify_digest_signature};

use crate::store::{LedgerStore, StoredTransaction};

// ── LedgerEngine ─────────────────────────────────────────────────────────────

/// The authoritative state-transition engine.
///
/// `apply_transaction` runs the full validation chain before touching any
/// state; either every mutation of a transaction lands or none does. The
/// store is rewritten to disk after each successful apply.
pub struct LedgerEngine {
    store: LedgerStore,
}

impl LedgerEngine {
    pub fn open(data_dir: &Path) -> Result<Self, ClawError> {
        Ok(Self { store: LedgerStore::open(data_dir)? })
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    /// Create a fresh account. Fails if the key is already present.
    pub fn create_account(
        &mut self,
        public_key: PublicKey,
        initial_balance: Balance,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        if self.store.account_exists(&public_key) {
            return Err(ClawError::AccountExists(public_key.to_hex()));
        }
        self.store
            .state
            .accounts
            .insert(public_key, Account::new(public_key, initial_balance, now_ms));
        self.store.persist()?;
        Ok(())
    }

    pub fn get_account(&self, public_key: &PublicKey) -> Option<&Account> {
        self.store.get_account(public_key)
    }

    /// Spendable balance; 0 for an absent account.
    pub fn get_balance(&self, public_key: &PublicKey) -> Balance {
        self.store.get_account(public_key).map(|a| a.balance).unwrap_or(0)
    }

    pub fn block_height(&self) -> u64 {
        self.store.block_height()
    }

    // ── Application ──────────────────────────────────────────────────────────

    /// Validate and apply a transaction. Returns the digest on success.
    ///
    /// Check order (nothing mutates until all checks pass):
    /// duplicate → sender exists → nonce → signature → economics →
    /// type-specific constraints.
    pub fn apply_transaction(
        &mut self,
        tx: &Transaction,
        now_ms: TimestampMs,
    ) -> Result<TxDigest, ClawError> {
        // ── Duplicate check ──────────────────────────────────────────────────
        let digest = tx_digest(tx)?;
        if self.store.transaction_exists(&digest) {
            return Err(ClawError::DuplicateTransaction(digest.to_hex()));
        }

        // ── Resolve sender ───────────────────────────────────────────────────
        let sender = self
            .store
            .get_account(&tx.from)
            .ok_or_else(|| ClawError::UnknownSender(tx.from.to_hex()))?
            .clone();

        // ── Nonce check ──────────────────────────────────────────────────────
        let expected = sender.nonce + 1;
        if tx.nonce != expected {
            return Err(ClawError::InvalidNonce { expected, got: tx.nonce });
        }

        // ── Signature check ──────────────────────────────────────────────────
        let signature = tx.signature.as_ref().ok_or(ClawError::InvalidSignature)?;
        if !verify_digest_signature(&tx.from, &digest, signature) {
            return Err(ClawError::InvalidSignature);
        }

        // ── Economic check ───────────────────────────────────────────────────
        let fee = fee_for(tx.tx_type);
        validate_economics(tx, sender.balance, fee)?;

        // ── Stage type-specific mutations ────────────────────────────────────
        // Staging through one map keyed by account makes sender == recipient
        // read-modify-write safe.
        let mut staged: BTreeMap<PublicKey, Account> = BTreeMap::new();
        staged.insert(tx.from, sender);

        match tx.tx_type {
            TxType::Transfer | TxType::SkillPurchase => {
                let to = tx
                    .to
                    .ok_or_else(|| ClawError::UnknownRecipient("recipient missing".into()))?;
                if !staged.contains_key(&to) {
                    let recipient = self
                        .store
                        .get_account(&to)
                        .ok_or_else(|| ClawError::UnknownRecipient(to.to_hex()))?
                        .clone();
                    staged.insert(to, recipient);
                }
                let sender = staged.get_mut(&tx.from).expect("staged above");
                sender.balance -= tx.amount + fee; // fee is burned
                let recipient = staged.get_mut(&to).expect("staged above");
                recipient.balance += tx.amount;
                recipient.last_active = now_ms;
            }

            TxType::Mint => {
                let to = tx
                    .to
                    .ok_or_else(|| ClawError::UnknownRecipient("recipient missing".into()))?;
                if !staged.contains_key(&to) {
                    let recipient = self
                        .store
                        .get_account(&to)
                        .ok_or_else(|| ClawError::UnknownRecipient(to.to_hex()))?
                        .clone();
                    staged.insert(to, recipient);
                }
                let recipient = staged.get_mut(&to).expect("staged above");
                recipient.balance += tx.amount;
                recipient.last_active = now_ms;
            }

            TxType::Burn => {
                let sender = staged.get_mut(&tx.from).expect("staged above");
                sender.balance -= tx.amount;
            }

            TxType::Stake => {
                let sender = staged.get_mut(&tx.from).expect("staged above");
                sender.balance -= tx.amount;
                sender.stake_locked += tx.amount;
                sender.stake_unlock_at = Some(now_ms + STAKE_LOCK_MS);
            }

            // Identity anchor only; the artifact lives in the marketplace.
            TxType::SkillCreate => {}
        }

        // ── Commit ───────────────────────────────────────────────────────────
        {
            let sender = staged.get_mut(&tx.from).expect("staged above");
            sender.nonce += 1;
            sender.last_active = now_ms;
        }
        for (pk, account) in staged {
            self.store.state.accounts.insert(pk, account);
        }

        let state = &mut self.store.state;
        state.block_height += 1;
        state.transactions.insert(
            digest,
            StoredTransaction {
                transaction: tx.clone(),
                block_height: state.block_height,
                applied_at: now_ms,
            },
        );
        state
            .account_transactions
            .entry(tx.from)
            .or_default()
            .push(digest);
        if let Some(to) = tx.to {
            if to != tx.from {
                state.account_transactions.entry(to).or_default().push(digest);
            }
        }

        self.store.persist()?;
        info!(digest = %digest, tx_type = ?tx.tx_type, height = self.store.block_height(), "applied transaction");
        Ok(digest)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// The account's transactions, newest first, truncated to `limit`.
    pub fn get_transaction_history(
        &self,
        public_key: &PublicKey,
        limit: usize,
    ) -> Vec<&StoredTransaction> {
        let mut records: Vec<&StoredTransaction> = self
            .store
            .account_digests(public_key)
            .iter()
            .filter_map(|d| self.store.get_transaction(d))
            .collect();
        records.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        records.truncate(limit);
        records
    }

    pub fn get_transaction_by_hash(&self, digest: &TxDigest) -> Option<&StoredTransaction> {
        self.store.get_transaction(digest)
    }

    /// All applied transactions, newest first, paginated.
    pub fn get_all_transactions(&self, limit: usize, offset: usize) -> Vec<&StoredTransaction> {
        let mut records: Vec<&StoredTransaction> =
            self.store.state.transactions.values().collect();
        records.sort_by(|a, b| b.applied_at.cmp(&a.applied_at).then(b.block_height.cmp(&a.block_height)));
        records.into_iter().skip(offset).take(limit).collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
