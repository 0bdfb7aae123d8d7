pub mod hash;
pub mod keypair;
pub mod verify;

pub use hash::{canonical_hash, sha256, sha256_hex, tx_digest};
pub use keypair::KeyPair;
pub use verify::{verify_digest_signature, verify_signature, verify_transaction};
