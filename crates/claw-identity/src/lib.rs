pub mod registry;

pub use registry::{BotIdentity, IdentityRegistry, IdentityState};
