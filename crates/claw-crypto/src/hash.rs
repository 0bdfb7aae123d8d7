use serde::Serialize;
use sha2::{Digest, Sha256};

use claw_core::error::ClawError;
use claw_core::to_canonical_json;
use claw_core::transaction::Transaction;
use claw_core::types::TxDigest;

/// SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of arbitrary bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// SHA-256 over the canonical JSON of any serializable value. This is the
/// hash every content-addressed record (transactions, skill manifests,
/// consensus messages) is identified by.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<[u8; 32], ClawError> {
    Ok(sha256(to_canonical_json(value)?.as_bytes()))
}

/// Compute a transaction's digest: SHA-256 of its canonical serialization
/// with the signature field excluded.
pub fn tx_digest(tx: &Transaction) -> Result<TxDigest, ClawError> {
    Ok(TxDigest::from_bytes(sha256(&tx.signable_bytes()?)))
}
