//! ─── Clawrrency Protocol Constants ──────────────────────────────────────────
//!
//! "A cooperative currency for autonomous agents."
//!
//! Unit of account: the shell (a non-negative integer).
//! Ticker:          SHL

// ── Amounts ──────────────────────────────────────────────────────────────────

/// Largest amount accepted in a single transaction (2^53 − 1, the bound up to
/// which JSON tooling round-trips integers exactly).
pub const MAX_AMOUNT_SHELLS: u64 = 9_007_199_254_740_991;

// ── Fees ─────────────────────────────────────────────────────────────────────

/// Base fee burned by every value-moving transfer.
pub const BASE_FEE_SHELLS: u64 = 1;

/// Priority fee multipliers; effective fee = ceil(base × multiplier).
pub const FEE_MULTIPLIER_LOW: f64 = 0.5;
pub const FEE_MULTIPLIER_NORMAL: f64 = 1.0;
pub const FEE_MULTIPLIER_HIGH: f64 = 2.0;

// ── Registration & stake ─────────────────────────────────────────────────────

/// Shells minted to a freshly registered bot carrying an attestation.
pub const REGISTRATION_MINT_ATTESTED: u64 = 100;

/// Shells minted to a freshly registered bot with no attestation.
pub const REGISTRATION_MINT_UNATTESTED: u64 = 50;

/// Stake locked to register a bot.
pub const REGISTRATION_STAKE_SHELLS: u64 = 50;

/// Discounted stake when the registrant carries a qualifying attestation.
pub const REGISTRATION_STAKE_ATTESTED_SHELLS: u64 = 25;

/// Minimum reputation an attester needs for its attestation to count.
pub const ATTESTER_MIN_REPUTATION: f64 = 100.0;

/// Stake lock duration: 30 days, in milliseconds.
pub const STAKE_LOCK_MS: u64 = 30 * 24 * 3_600 * 1_000;

// ── Reputation & voting ──────────────────────────────────────────────────────

/// Monthly multiplicative reputation decay (1% per month of account age).
pub const REPUTATION_DECAY_PER_MONTH: f64 = 0.01;

/// Hard cap on voting power regardless of reputation or holdings.
pub const VOTING_POWER_CAP: f64 = 1_000.0;

/// Account-age month used for reputation decay, in milliseconds (30 days).
pub const MONTH_MS: u64 = 30 * 24 * 3_600 * 1_000;

// ── Block rewards ────────────────────────────────────────────────────────────

/// Shells distributed to validators per committed block, split by
/// participation score.
pub const VALIDATOR_REWARD_PER_BLOCK: u64 = 10;

/// Shells accrued to the treasury per committed block.
pub const TREASURY_PER_BLOCK: u64 = 5;

// ── Marketplace ──────────────────────────────────────────────────────────────

/// Review ratings are clamped to this inclusive range.
pub const MIN_REVIEW_RATING: u8 = 1;
pub const MAX_REVIEW_RATING: u8 = 5;

// ── Consensus ────────────────────────────────────────────────────────────────

/// Leader inactivity window before a view change, in milliseconds.
pub const DEFAULT_VIEW_TIMEOUT_MS: u64 = 5_000;

/// The consensus message log is truncated every this many sequences.
pub const CHECKPOINT_INTERVAL: u64 = 1_024;

// ── Persistence ──────────────────────────────────────────────────────────────

/// Version stamped into every persistent state file.
pub const STATE_FILE_VERSION: u16 = 1;

/// Current transaction record version.
pub const TX_VERSION: u16 = 1;
