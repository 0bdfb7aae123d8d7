pub mod account;
pub mod canon;
pub mod constants;
pub mod economics;
pub mod error;
pub mod skill;
pub mod transaction;
pub mod types;

pub use account::Account;
pub use canon::to_canonical_json;
pub use constants::*;
pub use error::ClawError;
pub use skill::{
    Listing, ListingStatus, ManifestFile, Purchase, Review, SkillArtifact, SkillManifest,
    SkillType,
};
pub use transaction::{GovernanceData, SkillPurchaseData, Transaction, TxPayload, TxType};
pub use types::{Balance, Nonce, PublicKey, SignatureBytes, SkillId, TimestampMs, TxDigest};
