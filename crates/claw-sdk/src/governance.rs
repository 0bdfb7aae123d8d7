//! The governance seam.
//!
//! Proposal review and voting happen on an external channel; the core only
//! needs a capability surface it can call through. Implementations live
//! outside this workspace and are swapped freely.

use claw_core::error::ClawError;
use claw_core::types::{PublicKey, TimestampMs};

/// A proposal record as the oracle stores it.
#[derive(Clone, Debug, PartialEq)]
pub struct GovernanceProposal {
    pub id: String,
    pub title: String,
    pub description: String,
    pub proposer: PublicKey,
    pub created_at: TimestampMs,
}

/// Voting-power-weighted totals for one proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GovernanceTally {
    pub approve: f64,
    pub reject: f64,
}

/// Minimal capability set of the external governance channel.
pub trait GovernanceOracle {
    /// Publish a proposal; returns its id on the channel.
    fn submit_proposal(&mut self, proposal: GovernanceProposal) -> Result<String, ClawError>;

    /// Record one weighted vote.
    fn cast_vote(
        &mut self,
        proposal_id: &str,
        voter: PublicKey,
        approve: bool,
        power: f64,
    ) -> Result<(), ClawError>;

    /// Current totals.
    fn tally(&self, proposal_id: &str) -> Result<GovernanceTally, ClawError>;

    /// Execute an approved proposal on the channel.
    fn execute(&mut self, proposal_id: &str) -> Result<(), ClawError>;
}
