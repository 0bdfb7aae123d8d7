use serde::{Deserialize, Serialize};

use claw_core::error::ClawError;
use claw_core::to_canonical_json;
use claw_core::types::{PublicKey, SignatureBytes, TxDigest};
use claw_crypto::{verify_signature, KeyPair};

// ── Phases ───────────────────────────────────────────────────────────────────

/// The three agreement phases, in wire spelling.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MessagePhase {
    #[serde(rename = "pre-prepare")]
    PrePrepare,
    #[serde(rename = "prepare")]
    Prepare,
    #[serde(rename = "commit")]
    Commit,
}

// ── ConsensusMessage ─────────────────────────────────────────────────────────

/// One signed consensus message:
/// `{type, view, sequence, digest, validator, signature}`.
///
/// The signature covers the canonical JSON of the message with the signature
/// field set to the empty string.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConsensusMessage {
    #[serde(rename = "type")]
    pub phase: MessagePhase,
    pub view: u64,
    pub sequence: u64,
    pub digest: TxDigest,
    pub validator: String,
    pub signature: String,
}

impl ConsensusMessage {
    pub fn unsigned(
        phase: MessagePhase,
        view: u64,
        sequence: u64,
        digest: TxDigest,
        validator: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            view,
            sequence,
            digest,
            validator: validator.into(),
            signature: String::new(),
        }
    }

    /// The bytes the signature covers: canonical JSON with `signature: ""`.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ClawError> {
        let mut blank = self.clone();
        blank.signature = String::new();
        Ok(to_canonical_json(&blank)?.into_bytes())
    }

    /// Sign in place with the validator's keypair.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<(), ClawError> {
        let bytes = self.signing_bytes()?;
        self.signature = keypair.sign(&bytes).to_hex();
        Ok(())
    }

    /// Check the signature against the claimed validator's public key.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        let Ok(signature) = SignatureBytes::from_hex(&self.signature) else {
            return false;
        };
        let Ok(bytes) = self.signing_bytes() else {
            return false;
        };
        verify_signature(public_key, &bytes, &signature)
    }
}
