//! Marketplace record types: skill artifacts, listings, purchases, reviews.
//!
//! A skill's identity is the hash of its canonical manifest; the manifest in
//! turn pins the hash of every file. Verification recomputes both layers
//! (`claw-market` owns that logic; these are the shared shapes).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Balance, PublicKey, SkillId, TimestampMs, TxDigest};

// ── Manifest ─────────────────────────────────────────────────────────────────

/// Artifact category.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    Skill,
    Content,
    Compute,
    Service,
}

/// One file entry in a manifest: path plus SHA-256 of the file content
/// (lowercase hex).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestFile {
    pub path: String,
    pub hash: String,
}

/// The canonical descriptor of a skill artifact. Its canonical-JSON hash is
/// the artifact's id, so every field here is identity-bearing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SkillManifest {
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    /// Files in the creator's input order.
    pub files: Vec<ManifestFile>,
    pub dependencies: Vec<String>,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

/// A stored artifact: the manifest, the file contents it pins, and provenance.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SkillArtifact {
    pub id: SkillId,
    pub manifest: SkillManifest,
    /// path → file content.
    pub files: BTreeMap<String, String>,
    pub creator: PublicKey,
    pub created_at: TimestampMs,
}

// ── Listing / purchase / review ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    /// Part of the persistent shape for sellers that close a listing after
    /// a sale. Purchases never set it automatically: listings sell
    /// repeatedly and `sales_count` carries the tally.
    Sold,
    Delisted,
}

/// A review left by a verified purchaser.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub reviewer: PublicKey,
    /// 1..=5 inclusive, enforced at submission.
    pub rating: u8,
    pub comment: String,
    pub created_at: TimestampMs,
}

/// A skill offered for sale.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub skill_id: SkillId,
    /// Always the skill's creator.
    pub seller: PublicKey,
    pub price: Balance,
    pub listed_at: TimestampMs,
    pub status: ListingStatus,
    pub sales_count: u64,
    /// Arithmetic mean of review ratings; 0.0 while unreviewed.
    pub rating: f64,
    pub reviews: Vec<Review>,
}

/// A completed sale, anchored to the value-moving ledger transaction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Purchase {
    pub skill_id: SkillId,
    pub buyer: PublicKey,
    pub seller: PublicKey,
    pub price: Balance,
    pub purchased_at: TimestampMs,
    pub tx_digest: TxDigest,
}
