use serde::{Deserialize, Serialize};

use crate::canon::to_canonical_json;
use crate::error::ClawError;
use crate::types::{Balance, Nonce, PublicKey, SignatureBytes, SkillId, TimestampMs};

// ── TxType ───────────────────────────────────────────────────────────────────

/// Every value-affecting operation on the ledger is one of these.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    /// Move shells between two existing accounts.
    Transfer,
    /// Create shells and credit a recipient (registration rewards, block
    /// rewards).
    Mint,
    /// Destroy shells from the sender's balance.
    Burn,
    /// Move shells from the sender's spendable balance into its stake lock.
    Stake,
    /// Anchor a skill artifact's identity on the ledger.
    SkillCreate,
    /// Pay a skill's listed price to its seller.
    SkillPurchase,
}

// ── Payloads ─────────────────────────────────────────────────────────────────

/// Payload attached to a `skill_purchase` transaction. Mirrors the listing at
/// purchase time so the ledger record is self-describing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SkillPurchaseData {
    pub skill_id: SkillId,
    pub manifest_hash: SkillId,
    pub creator: PublicKey,
    pub price: Balance,
    pub created_at: TimestampMs,
}

/// Payload carried by governance-originated transactions. The governance
/// channel itself is an external collaborator; the ledger only records the
/// vote reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GovernanceData {
    pub proposal_id: String,
    pub vote: bool,
}

/// Optional typed payload of a transaction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TxPayload {
    Skill(SkillPurchaseData),
    Governance(GovernanceData),
}

// ── Transaction ──────────────────────────────────────────────────────────────

/// A fully-formed clawrrency transaction.
///
/// The digest (its stable identity) is SHA-256 over the canonical JSON of all
/// fields EXCEPT `signature`; the signature is produced over the hex-encoded
/// digest string. Both conventions are normative for cross-implementation
/// bit-compatibility.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Record version (currently 1).
    pub version: u16,

    #[serde(rename = "type")]
    pub tx_type: TxType,

    /// The account authorizing this transaction.
    pub from: PublicKey,

    /// Counterparty; required for transfer, mint and skill_purchase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<PublicKey>,

    /// Amount in shells.
    pub amount: Balance,

    /// Must equal the sender's last consumed nonce + 1.
    pub nonce: Nonce,

    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: TimestampMs,

    /// Optional typed payload (skill or governance data).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TxPayload>,

    /// Detached Ed25519 signature; absent only while the record is being
    /// built and signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureBytes>,
}

/// The signed view of a transaction: every field except the signature,
/// borrowed. Serializing this is exactly the canonical form the digest and
/// signature are computed over.
#[derive(Serialize)]
struct SignableTransaction<'a> {
    version: u16,
    #[serde(rename = "type")]
    tx_type: TxType,
    from: &'a PublicKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a PublicKey>,
    amount: Balance,
    nonce: Nonce,
    timestamp: TimestampMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a TxPayload>,
}

impl Transaction {
    /// Canonical JSON bytes of the transaction with the signature excluded.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, ClawError> {
        let body = SignableTransaction {
            version: self.version,
            tx_type: self.tx_type,
            from: &self.from,
            to: self.to.as_ref(),
            amount: self.amount,
            nonce: self.nonce,
            timestamp: self.timestamp,
            data: self.data.as_ref(),
        };
        Ok(to_canonical_json(&body)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            tx_type: TxType::Transfer,
            from: PublicKey::from_bytes([1; 32]),
            to: Some(PublicKey::from_bytes([2; 32])),
            amount: 100,
            nonce: 1,
            timestamp: 1_700_000_000_000,
            data: None,
            signature: None,
        }
    }

    #[test]
    fn signable_bytes_exclude_signature() {
        let mut tx = sample_tx();
        let unsigned = tx.signable_bytes().unwrap();
        tx.signature = Some(SignatureBytes::from_bytes([7; 64]));
        let signed = tx.signable_bytes().unwrap();
        assert_eq!(unsigned, signed);
        assert!(!String::from_utf8(unsigned).unwrap().contains("signature"));
    }

    #[test]
    fn absent_optionals_are_omitted() {
        let mut tx = sample_tx();
        tx.to = None;
        let s = String::from_utf8(tx.signable_bytes().unwrap()).unwrap();
        assert!(!s.contains("\"to\""));
        assert!(!s.contains("null"));
    }

    #[test]
    fn tx_type_uses_snake_case() {
        let json = serde_json::to_string(&TxType::SkillPurchase).unwrap();
        assert_eq!(json, "\"skill_purchase\"");
    }

    #[test]
    fn wire_round_trip() {
        let tx = sample_tx();
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn governance_payload_round_trip() {
        let mut tx = sample_tx();
        tx.data = Some(TxPayload::Governance(GovernanceData {
            proposal_id: "prop-7".into(),
            vote: true,
        }));
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"vote\":true"));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);

        // The wire shape is `{proposal_id, vote}`; a payload written by an
        // external oracle must resolve to the governance variant.
        let payload: TxPayload =
            serde_json::from_str(r#"{"proposal_id":"prop-7","vote":false}"#).unwrap();
        assert_eq!(
            payload,
            TxPayload::Governance(GovernanceData { proposal_id: "prop-7".into(), vote: false })
        );
    }
}
