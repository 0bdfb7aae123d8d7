use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;

use claw_core::error::ClawError;
use claw_core::transaction::Transaction;
use claw_core::types::{PublicKey, SignatureBytes, TxDigest};

use crate::hash::tx_digest;

/// A clawrrency keypair: Ed25519 signing key with its derived public key.
///
/// The signing key wipes its memory on drop (`ed25519-dalek` zeroizes).
pub struct KeyPair {
    public_key: PublicKey,
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh Ed25519 keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Restore a keypair from raw secret-key bytes (e.g. a wallet record).
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&secret))
    }

    /// Restore a keypair from a hex-encoded secret key.
    pub fn from_secret_hex(s: &str) -> Result<Self, ClawError> {
        let bytes = hex::decode(s).map_err(|e| ClawError::InvalidHex(format!("secret key: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ClawError::InvalidHex("secret key: expected 32 bytes".into()))?;
        Ok(Self::from_secret_bytes(arr))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key = PublicKey::from_bytes(signing_key.verifying_key().to_bytes());
        Self { public_key, signing_key }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Hex of the secret key, for wallet persistence.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Sign raw message bytes.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::from_bytes(self.signing_key.sign(message).to_bytes())
    }

    /// Sign a transaction digest. The signed message is the hex-encoded
    /// digest string as UTF-8 bytes, not the raw 32 bytes; this convention
    /// is load-bearing for cross-implementation compatibility.
    pub fn sign_digest(&self, digest: &TxDigest) -> SignatureBytes {
        self.sign(digest.to_hex().as_bytes())
    }

    /// Compute the digest of `tx`, sign it, and attach the signature.
    /// Returns the digest.
    pub fn sign_transaction(&self, tx: &mut Transaction) -> Result<TxDigest, ClawError> {
        let digest = tx_digest(tx)?;
        tx.signature = Some(self.sign_digest(&digest));
        Ok(digest)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {:?} }}", self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{verify_digest_signature, verify_signature};

    #[test]
    fn sign_verify_round_trip() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"hello shells");
        assert!(verify_signature(&kp.public_key(), b"hello shells", &sig));
        assert!(!verify_signature(&kp.public_key(), b"hello shellz", &sig));
    }

    #[test]
    fn other_key_rejects_signature() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let sig = kp.sign(b"message");
        assert!(!verify_signature(&other.public_key(), b"message", &sig));
    }

    #[test]
    fn secret_hex_round_trip() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_hex(&kp.secret_hex()).unwrap();
        assert_eq!(restored.public_key(), kp.public_key());
    }

    #[test]
    fn digest_signature_covers_hex_string() {
        let kp = KeyPair::generate();
        let digest = TxDigest::from_bytes([0x5A; 32]);
        let sig = kp.sign_digest(&digest);
        // The convention is hex-string-as-UTF-8, not raw digest bytes.
        assert!(verify_signature(&kp.public_key(), digest.to_hex().as_bytes(), &sig));
        assert!(!verify_signature(&kp.public_key(), digest.as_bytes(), &sig));
        assert!(verify_digest_signature(&kp.public_key(), &digest, &sig));
    }
}
