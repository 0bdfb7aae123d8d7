pub mod marketplace;

pub use marketplace::{Marketplace, MarketState, SkillDraft, SkillFile};
