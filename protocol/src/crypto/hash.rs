//! # Hashing Utilities
//!
//! Two hash functions, each with a narrow job:
//!
//! - **SHA-256** — consensus-visible digests: transaction IDs and the
//!   fee-vote commitment that binds a reveal to its earlier commit. Clients
//!   in other languages must reproduce these byte for byte, so we stick to
//!   the function every platform ships.
//!
//! - **BLAKE3** — local bookkeeping where nobody else needs to agree with us
//!   (block hashes minted by the replay tool and test fixtures).

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Derive a transaction identifier from its canonical envelope bytes.
///
/// The ID is the first eight bytes of `SHA-256(bytes)` read as a
/// little-endian `i64`. Collisions inside one chain are astronomically
/// unlikely and would be caught by the storage layer's primary key anyway.
pub fn transaction_id(bytes: &[u8]) -> i64 {
    let digest = sha256_array(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_le_bytes(head)
}
