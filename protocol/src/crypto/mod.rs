//! # Cryptographic Primitives
//!
//! Thin wrappers over audited implementations. Nothing here is novel and
//! nothing here should be: the execution core consumes signatures and
//! hashes, it does not invent them.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, sha256_array, transaction_id};
pub use keys::{NodeKeypair, NodePublicKey, Signature};
