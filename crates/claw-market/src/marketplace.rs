use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use claw_core::constants::{MAX_REVIEW_RATING, MIN_REVIEW_RATING, STATE_FILE_VERSION};
use claw_core::error::ClawError;
use claw_core::skill::{
    Listing, ListingStatus, ManifestFile, Purchase, Review, SkillArtifact, SkillManifest,
    SkillType,
};
use claw_core::transaction::{SkillPurchaseData, Transaction, TxPayload, TxType};
use claw_core::types::{Balance, PublicKey, SkillId, TimestampMs};
use claw_crypto::{canonical_hash, sha256_hex, KeyPair};
use claw_identity::IdentityRegistry;
use claw_ledger::LedgerEngine;

// ── Input shape ──────────────────────────────────────────────────────────────

/// One file offered for inclusion in a skill, before hashing.
#[derive(Clone, Debug)]
pub struct SkillFile {
    pub path: String,
    pub content: String,
}

/// Everything a creator supplies for a new skill; hashes and identity are
/// derived, never supplied.
#[derive(Clone, Debug)]
pub struct SkillDraft {
    pub name: String,
    pub description: String,
    pub version: String,
    pub skill_type: SkillType,
    pub files: Vec<SkillFile>,
    pub dependencies: Vec<String>,
    pub license: String,
    pub entry_point: Option<String>,
}

// ── Persistent state ─────────────────────────────────────────────────────────

/// `{version, skills, listings, purchases}` — all keyed by skill id hex.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketState {
    pub version: u16,
    pub skills: BTreeMap<SkillId, SkillArtifact>,
    pub listings: BTreeMap<SkillId, Listing>,
    pub purchases: BTreeMap<SkillId, Vec<Purchase>>,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION,
            skills: BTreeMap::new(),
            listings: BTreeMap::new(),
            purchases: BTreeMap::new(),
        }
    }
}

// ── Marketplace ──────────────────────────────────────────────────────────────

/// The content-addressed skill marketplace. Owns skills, listings and
/// purchases; moves value exclusively through `skill_purchase` transactions
/// applied by the shared ledger engine. State persists to
/// `<data_dir>/skills.json` after every mutation.
pub struct Marketplace {
    path: PathBuf,
    state: MarketState,
    ledger: Arc<Mutex<LedgerEngine>>,
    /// When wired, skill creation and settled purchases feed the creator's
    /// and buyer's reputation counters.
    identity: Option<Arc<Mutex<IdentityRegistry>>>,
}

impl Marketplace {
    pub fn open(
        data_dir: &Path,
        ledger: Arc<Mutex<LedgerEngine>>,
        identity: Option<Arc<Mutex<IdentityRegistry>>>,
    ) -> Result<Self, ClawError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| ClawError::Storage(format!("creating {}: {e}", data_dir.display())))?;
        let path = data_dir.join("skills.json");
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| ClawError::Storage(format!("reading {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| ClawError::Storage(format!("corrupt {}: {e}", path.display())))?
        } else {
            MarketState::default()
        };
        Ok(Self { path, state, ledger, identity })
    }

    fn persist(&self) -> Result<(), ClawError> {
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| ClawError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| ClawError::Storage(format!("writing {}: {e}", self.path.display())))?;
        Ok(())
    }

    // ── Creation ─────────────────────────────────────────────────────────────

    /// Hash the draft's files, assemble the canonical manifest and store the
    /// artifact under its content address. A second artifact with the same
    /// id is rejected.
    pub fn create_skill(
        &mut self,
        draft: SkillDraft,
        creator: PublicKey,
        now_ms: TimestampMs,
    ) -> Result<SkillId, ClawError> {
        let manifest = SkillManifest {
            name: draft.name,
            description: draft.description,
            version: draft.version,
            skill_type: draft.skill_type,
            files: draft
                .files
                .iter()
                .map(|f| ManifestFile {
                    path: f.path.clone(),
                    hash: sha256_hex(f.content.as_bytes()),
                })
                .collect(),
            dependencies: draft.dependencies,
            license: draft.license,
            entry_point: draft.entry_point,
        };
        let id = SkillId::from_bytes(canonical_hash(&manifest)?);
        if self.state.skills.contains_key(&id) {
            return Err(ClawError::DuplicateSkill(id.to_hex()));
        }

        let artifact = SkillArtifact {
            id,
            manifest,
            files: draft
                .files
                .into_iter()
                .map(|f| (f.path, f.content))
                .collect(),
            creator,
            created_at: now_ms,
        };
        self.state.skills.insert(id, artifact);
        self.persist()?;

        if let Some(identity) = &self.identity {
            let mut reg = identity
                .lock()
                .map_err(|_| ClawError::Storage("identity lock poisoned".into()))?;
            if let Err(e) = reg.record_skill_published(&creator, now_ms) {
                debug!(creator = %creator, error = %e, "skill count not recorded");
            }
        }
        info!(skill = %id, creator = %creator, "created skill");
        Ok(id)
    }

    // ── Listing ──────────────────────────────────────────────────────────────

    /// Offer a skill for sale. Only its creator may list it; re-listing
    /// reactivates the existing listing at the new price.
    pub fn list_skill(
        &mut self,
        id: &SkillId,
        price: Balance,
        seller: &PublicKey,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        let artifact = self
            .state
            .skills
            .get(id)
            .ok_or_else(|| ClawError::SkillNotFound(id.to_hex()))?;
        if artifact.creator != *seller {
            return Err(ClawError::NotCreator);
        }

        match self.state.listings.get_mut(id) {
            Some(listing) => {
                listing.price = price;
                listing.status = ListingStatus::Active;
                listing.listed_at = now_ms;
            }
            None => {
                self.state.listings.insert(
                    *id,
                    Listing {
                        skill_id: *id,
                        seller: *seller,
                        price,
                        listed_at: now_ms,
                        status: ListingStatus::Active,
                        sales_count: 0,
                        rating: 0.0,
                        reviews: Vec::new(),
                    },
                );
            }
        }
        self.persist()?;
        info!(skill = %id, price, "listed skill");
        Ok(())
    }

    /// Take a skill off the market. Only the seller may delist.
    pub fn delist_skill(&mut self, id: &SkillId, seller: &PublicKey) -> Result<(), ClawError> {
        let listing = self
            .state
            .listings
            .get_mut(id)
            .ok_or_else(|| ClawError::NotListed(id.to_hex()))?;
        if listing.seller != *seller {
            return Err(ClawError::NotCreator);
        }
        listing.status = ListingStatus::Delisted;
        self.persist()?;
        info!(skill = %id, "delisted skill");
        Ok(())
    }

    // ── Purchase ─────────────────────────────────────────────────────────────

    /// Buy a listed skill: builds, signs and applies the `skill_purchase`
    /// transaction, then records the purchase against the settled digest.
    pub fn purchase_skill(
        &mut self,
        id: &SkillId,
        buyer: &PublicKey,
        buyer_keypair: &KeyPair,
        now_ms: TimestampMs,
    ) -> Result<Purchase, ClawError> {
        if buyer_keypair.public_key() != *buyer {
            return Err(ClawError::InvalidSignature);
        }
        let listing = self
            .state
            .listings
            .get(id)
            .ok_or_else(|| ClawError::NotListed(id.to_hex()))?;
        if listing.status != ListingStatus::Active {
            return Err(ClawError::NotListed(id.to_hex()));
        }
        let artifact = self
            .state
            .skills
            .get(id)
            .ok_or_else(|| ClawError::SkillNotFound(id.to_hex()))?;
        let seller = listing.seller;
        let price = listing.price;

        let digest = {
            let mut ledger = self
                .ledger
                .lock()
                .map_err(|_| ClawError::Storage("ledger lock poisoned".into()))?;
            let account = ledger
                .get_account(buyer)
                .ok_or_else(|| ClawError::UnknownSender(buyer.to_hex()))?;
            if account.balance < price {
                return Err(ClawError::InsufficientBalance {
                    need: price,
                    have: account.balance,
                });
            }

            let mut tx = Transaction {
                version: 1,
                tx_type: TxType::SkillPurchase,
                from: *buyer,
                to: Some(seller),
                amount: price,
                nonce: account.nonce + 1,
                timestamp: now_ms,
                data: Some(TxPayload::Skill(SkillPurchaseData {
                    skill_id: *id,
                    manifest_hash: *id,
                    creator: artifact.creator,
                    price,
                    created_at: artifact.created_at,
                })),
                signature: None,
            };
            buyer_keypair.sign_transaction(&mut tx)?;
            ledger.apply_transaction(&tx, now_ms)?
        };

        let purchase = Purchase {
            skill_id: *id,
            buyer: *buyer,
            seller,
            price,
            purchased_at: now_ms,
            tx_digest: digest,
        };
        self.state.purchases.entry(*id).or_default().push(purchase.clone());
        if let Some(listing) = self.state.listings.get_mut(id) {
            listing.sales_count += 1;
        }
        self.persist()?;

        if let Some(identity) = &self.identity {
            let mut reg = identity
                .lock()
                .map_err(|_| ClawError::Storage("identity lock poisoned".into()))?;
            if let Err(e) = reg.record_trade(buyer, now_ms) {
                debug!(buyer = %buyer, error = %e, "trade count not recorded");
            }
        }
        info!(skill = %id, buyer = %buyer, price, "purchased skill");
        Ok(purchase)
    }

    // ── Verification ─────────────────────────────────────────────────────────

    /// Recompute the manifest hash and every file hash from stored content;
    /// any mismatch invalidates the artifact.
    pub fn verify_skill(&self, id: &SkillId) -> Result<(), ClawError> {
        let artifact = self
            .state
            .skills
            .get(id)
            .ok_or_else(|| ClawError::SkillNotFound(id.to_hex()))?;

        let recomputed = SkillId::from_bytes(canonical_hash(&artifact.manifest)?);
        if recomputed != artifact.id {
            return Err(ClawError::InvalidSkill(format!(
                "manifest hash mismatch: stored {}, computed {}",
                artifact.id, recomputed
            )));
        }
        for entry in &artifact.manifest.files {
            let content = artifact.files.get(&entry.path).ok_or_else(|| {
                ClawError::InvalidSkill(format!("missing file content: {}", entry.path))
            })?;
            let hash = sha256_hex(content.as_bytes());
            if hash != entry.hash {
                return Err(ClawError::InvalidSkill(format!(
                    "file hash mismatch for {}",
                    entry.path
                )));
            }
        }
        Ok(())
    }

    // ── Reviews ──────────────────────────────────────────────────────────────

    /// Leave a review; only recorded purchasers may review, ratings are
    /// clamped to 1..=5, and the listing's aggregate rating is the mean.
    pub fn add_review(
        &mut self,
        id: &SkillId,
        reviewer: &PublicKey,
        rating: u8,
        comment: &str,
        now_ms: TimestampMs,
    ) -> Result<(), ClawError> {
        if !(MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(&rating) {
            return Err(ClawError::InvalidRating {
                min: MIN_REVIEW_RATING,
                max: MAX_REVIEW_RATING,
            });
        }
        let purchased = self
            .state
            .purchases
            .get(id)
            .map(|p| p.iter().any(|purchase| purchase.buyer == *reviewer))
            .unwrap_or(false);
        if !purchased {
            return Err(ClawError::ReviewWithoutPurchase);
        }
        let listing = self
            .state
            .listings
            .get_mut(id)
            .ok_or_else(|| ClawError::NotListed(id.to_hex()))?;

        listing.reviews.push(Review {
            reviewer: *reviewer,
            rating,
            comment: comment.to_string(),
            created_at: now_ms,
        });
        let total: u64 = listing.reviews.iter().map(|r| r.rating as u64).sum();
        listing.rating = total as f64 / listing.reviews.len() as f64;
        self.persist()?;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn get_skill(&self, id: &SkillId) -> Option<&SkillArtifact> {
        self.state.skills.get(id)
    }

    pub fn get_listing(&self, id: &SkillId) -> Option<&Listing> {
        self.state.listings.get(id)
    }

    pub fn get_purchases(&self, id: &SkillId) -> &[Purchase] {
        self.state
            .purchases
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn list_active(&self) -> impl Iterator<Item = &Listing> {
        self.state
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Active)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
