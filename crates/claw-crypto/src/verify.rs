use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use claw_core::error::ClawError;
use claw_core::transaction::Transaction;
use claw_core::types::{PublicKey, SignatureBytes, TxDigest};

use crate::hash::tx_digest;

/// Verify an Ed25519 signature over raw message bytes. Malformed keys
/// (points off the curve) simply fail verification.
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &SignatureBytes,
) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key.as_bytes()) else {
        return false;
    };
    let sig = Signature::from_bytes(signature.as_bytes());
    verifying_key.verify(message, &sig).is_ok()
}

/// Verify a signature produced over a transaction digest: the signed message
/// is the hex-encoded digest string as UTF-8 bytes.
pub fn verify_digest_signature(
    public_key: &PublicKey,
    digest: &TxDigest,
    signature: &SignatureBytes,
) -> bool {
    verify_signature(public_key, digest.to_hex().as_bytes(), signature)
}

/// Recompute a transaction's digest and check its attached signature against
/// the sender's public key.
pub fn verify_transaction(tx: &Transaction) -> Result<TxDigest, ClawError> {
    let digest = tx_digest(tx)?;
    let signature = tx.signature.as_ref().ok_or(ClawError::InvalidSignature)?;
    if !verify_digest_signature(&tx.from, &digest, signature) {
        return Err(ClawError::InvalidSignature);
    }
    Ok(digest)
}
