/// Proof-of-Action commitment primitives.
///
/// A PoA commitment binds four things together: the goal the agent was
/// given, the URL it acted on, the engine-reported completion timestamp,
/// and the structured result payload. The commitment is the SHA-256 of a
/// canonical JSON serialization of that tuple, so the same execution
/// always produces the same hash on any machine.
pub mod canonical;
pub mod hash;

pub use canonical::canonical_bytes;
pub use hash::{poa_hash, sha256_hex};
