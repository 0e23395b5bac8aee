//! # Authentication Capabilities
//!
//! Proof-of-ownership and signature checks consumed by the node-registry
//! and fee-vote kinds. Both are traits so tests can swap in fakes through
//! [`Dependencies`](crate::transaction::dispatcher::Dependencies).

pub mod poown;
pub mod signature;

pub use poown::{OwnershipVerifier, PoownMessage, PoownVerifier, ProofOfOwnership};
pub use signature::{Ed25519Verifier, SignatureVerifier};
