pub mod message;
pub mod pbft;

pub use message::{ConsensusMessage, MessagePhase};
pub use pbft::{CommitCallback, ConsensusConfig, PbftNode, ValidatorPeer};
