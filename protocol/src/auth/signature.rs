//! Signature verification capability.

use crate::crypto::keys::{NodePublicKey, Signature};

/// Verifies detached signatures made with a node key.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &NodePublicKey, message: &[u8], signature: &Signature) -> bool;
}

/// Plain Ed25519.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &NodePublicKey, message: &[u8], signature: &Signature) -> bool {
        public_key.verify(message, signature)
    }
}
