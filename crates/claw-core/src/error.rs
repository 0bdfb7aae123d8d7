use thiserror::Error;

/// Every validation failure in the core carries one of these variants.
/// `code()` exposes the stable machine-readable code that external
/// collaborators (CLI, governance channel) match on.
#[derive(Debug, Error)]
pub enum ClawError {
    // ── Transaction errors ───────────────────────────────────────────────────
    #[error("invalid signature")]
    InvalidSignature,

    #[error("insufficient balance: need {need} shells, have {have}")]
    InsufficientBalance { need: u64, have: u64 },

    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown sender: {0}")]
    UnknownSender(String),

    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("account already exists: {0}")]
    AccountExists(String),

    // ── Registration errors ──────────────────────────────────────────────────
    #[error("stake of {required} shells required, got {got}")]
    StakeRequired { required: u64, got: u64 },

    #[error("attester reputation too low: need {required}, have {actual}")]
    ReputationTooLow { required: u32, actual: u32 },

    #[error("bot already registered: {0}")]
    AlreadyRegistered(String),

    #[error("unknown bot: {0}")]
    UnknownBot(String),

    // ── Marketplace errors ───────────────────────────────────────────────────
    #[error("invalid skill: {0}")]
    InvalidSkill(String),

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("duplicate skill: {0}")]
    DuplicateSkill(String),

    #[error("skill is not listed for sale: {0}")]
    NotListed(String),

    #[error("only the skill creator may do this")]
    NotCreator,

    #[error("review requires a recorded purchase of the skill")]
    ReviewWithoutPurchase,

    #[error("review rating must be between {min} and {max}")]
    InvalidRating { min: u8, max: u8 },

    // ── Consensus errors ─────────────────────────────────────────────────────
    #[error("consensus failure: {0}")]
    ConsensusFailure(String),

    // ── Encoding / persistence ───────────────────────────────────────────────
    #[error("invalid hex identifier: {0}")]
    InvalidHex(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ClawError {
    /// Stable error code, never renamed once shipped.
    pub fn code(&self) -> &'static str {
        match self {
            ClawError::InvalidSignature => "INVALID_SIGNATURE",
            ClawError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ClawError::InvalidNonce { .. } => "INVALID_NONCE",
            ClawError::InvalidAmount(_) => "INVALID_AMOUNT",
            ClawError::UnknownSender(_) => "UNKNOWN_SENDER",
            ClawError::UnknownRecipient(_) => "UNKNOWN_RECIPIENT",
            ClawError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            ClawError::AccountExists(_) => "ACCOUNT_EXISTS",
            ClawError::StakeRequired { .. } => "STAKE_REQUIRED",
            ClawError::ReputationTooLow { .. } => "REPUTATION_TOO_LOW",
            ClawError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            ClawError::UnknownBot(_) => "UNKNOWN_BOT",
            ClawError::InvalidSkill(_) => "INVALID_SKILL",
            ClawError::SkillNotFound(_) => "SKILL_NOT_FOUND",
            ClawError::DuplicateSkill(_) => "DUPLICATE_SKILL",
            ClawError::NotListed(_) => "NOT_LISTED",
            ClawError::NotCreator => "NOT_CREATOR",
            ClawError::ReviewWithoutPurchase => "REVIEW_WITHOUT_PURCHASE",
            ClawError::InvalidRating { .. } => "INVALID_RATING",
            ClawError::ConsensusFailure(_) => "CONSENSUS_FAILURE",
            ClawError::InvalidHex(_) => "INVALID_HEX",
            ClawError::Serialization(_) => "SERIALIZATION",
            ClawError::Storage(_) => "STORAGE",
        }
    }
}
