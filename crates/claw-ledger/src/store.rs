use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use claw_core::account::Account;
use claw_core::constants::STATE_FILE_VERSION;
use claw_core::error::ClawError;
use claw_core::transaction::Transaction;
use claw_core::types::{PublicKey, TimestampMs, TxDigest};

/// One applied transaction as recorded in the global log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredTransaction {
    pub transaction: Transaction,
    /// Ledger height at the moment this transaction was applied.
    pub block_height: u64,
    pub applied_at: TimestampMs,
}

/// The full persistent ledger state:
/// `{version, block_height, accounts, transactions, account_transactions}`,
/// all maps keyed by hex strings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerState {
    pub version: u16,
    pub block_height: u64,
    pub accounts: BTreeMap<PublicKey, Account>,
    pub transactions: BTreeMap<TxDigest, StoredTransaction>,
    pub account_transactions: BTreeMap<PublicKey, Vec<TxDigest>>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION,
            block_height: 0,
            accounts: BTreeMap::new(),
            transactions: BTreeMap::new(),
            account_transactions: BTreeMap::new(),
        }
    }
}

/// Durable ledger storage: the whole state lives in memory and is written to
/// `<data_dir>/ledger.json` after every mutation. A transactional KV store
/// could be substituted behind this same surface.
pub struct LedgerStore {
    path: PathBuf,
    pub(crate) state: LedgerState,
}

impl LedgerStore {
    /// Load the state file under `data_dir`, or start fresh if none exists.
    /// A file that exists but does not parse is a fatal startup error.
    pub fn open(data_dir: &Path) -> Result<Self, ClawError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| ClawError::Storage(format!("creating {}: {e}", data_dir.display())))?;
        let path = data_dir.join("ledger.json");
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| ClawError::Storage(format!("reading {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| ClawError::Storage(format!("corrupt {}: {e}", path.display())))?
        } else {
            LedgerState::default()
        };
        Ok(Self { path, state })
    }

    /// Write the full state back to disk (pretty-printed, 2-space indent).
    pub fn persist(&self) -> Result<(), ClawError> {
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| ClawError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| ClawError::Storage(format!("writing {}: {e}", self.path.display())))?;
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn get_account(&self, pk: &PublicKey) -> Option<&Account> {
        self.state.accounts.get(pk)
    }

    pub fn account_exists(&self, pk: &PublicKey) -> bool {
        self.state.accounts.contains_key(pk)
    }

    pub fn get_transaction(&self, digest: &TxDigest) -> Option<&StoredTransaction> {
        self.state.transactions.get(digest)
    }

    pub fn transaction_exists(&self, digest: &TxDigest) -> bool {
        self.state.transactions.contains_key(digest)
    }

    pub fn account_digests(&self, pk: &PublicKey) -> &[TxDigest] {
        self.state
            .account_transactions
            .get(pk)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn block_height(&self) -> u64 {
        self.state.block_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("claw_store_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn fresh_store_starts_empty() {
        let dir = temp_dir("fresh");
        let store = LedgerStore::open(&dir).unwrap();
        assert_eq!(store.block_height(), 0);
        assert!(store.state.accounts.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn persist_and_reload() {
        let dir = temp_dir("reload");
        let pk = PublicKey::from_bytes([3; 32]);
        {
            let mut store = LedgerStore::open(&dir).unwrap();
            store.state.accounts.insert(pk, Account::new(pk, 500, 1));
            store.state.block_height = 7;
            store.persist().unwrap();
        }
        let store = LedgerStore::open(&dir).unwrap();
        assert_eq!(store.block_height(), 7);
        assert_eq!(store.get_account(&pk).unwrap().balance, 500);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_state_file_fails_open() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ledger.json"), "{not json").unwrap();
        assert!(matches!(
            LedgerStore::open(&dir),
            Err(ClawError::Storage(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
