pub mod engine;
pub mod store;

pub use engine::LedgerEngine;
pub use store::{LedgerState, LedgerStore, StoredTransaction};
