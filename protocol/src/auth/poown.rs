//! Proof of node ownership.
//!
//! A node operator proves control of a node key by signing a short message
//! naming the owner account and a recent block. Binding the proof to a
//! recent block keeps an old proof from being replayed forever.
//!
//! Wire layout:
//!
//! ```text
//! message_len u32 | message | signature [64]
//! message = account_len u32 | account | block_hash [32] | block_height u32
//! ```

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::config::{BLOCK_HASH_LENGTH, POOWN_SIGNATURE_LENGTH};
use crate::crypto::keys::{NodeKeypair, NodePublicKey, Signature};
use crate::ledger::StateView;
use crate::transaction::codec::{prefixed_size, put_prefixed, BodyCodec, BodyReader, CodecError};
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::{AccountAddress, BlockHash};

/// The signed part of a proof of ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoownMessage {
    pub account: AccountAddress,
    pub block_hash: BlockHash,
    pub block_height: u32,
}

impl BodyCodec for PoownMessage {
    fn size(&self) -> u32 {
        (prefixed_size(self.account.len()) + BLOCK_HASH_LENGTH + 4) as u32
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        put_prefixed(buf, self.account.as_bytes());
        buf.put_slice(&self.block_hash);
        buf.put_u32_le(self.block_height);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            account: AccountAddress::new(reader.prefixed("poown.account")?),
            block_hash: reader.array32("poown.block_hash")?,
            block_height: reader.u32("poown.block_height")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfOwnership {
    pub message: PoownMessage,
    pub signature: Signature,
}

impl ProofOfOwnership {
    /// Sign a proof for `account` referencing the given block.
    pub fn sign(
        keypair: &NodeKeypair,
        account: AccountAddress,
        block_hash: BlockHash,
        block_height: u32,
    ) -> Self {
        let message = PoownMessage {
            account,
            block_hash,
            block_height,
        };
        let signature = keypair.sign(&message.to_bytes());
        Self { message, signature }
    }
}

impl BodyCodec for ProofOfOwnership {
    fn size(&self) -> u32 {
        (prefixed_size(self.message.size() as usize) + POOWN_SIGNATURE_LENGTH) as u32
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        put_prefixed(buf, &self.message.to_bytes());
        // Fixed-width slot: short signatures are zero-padded, long ones cut.
        let mut sig = [0u8; POOWN_SIGNATURE_LENGTH];
        let raw = self.signature.as_bytes();
        let n = raw.len().min(POOWN_SIGNATURE_LENGTH);
        sig[..n].copy_from_slice(&raw[..n]);
        buf.put_slice(&sig);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        let message_bytes = reader.prefixed("poown.message")?;
        let message = PoownMessage::parse(&message_bytes)?;
        let signature = Signature::from_bytes(reader.bytes("poown.signature", POOWN_SIGNATURE_LENGTH)?);
        Ok(Self { message, signature })
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Capability consumed by the node-registry kinds.
pub trait OwnershipVerifier: Send + Sync {
    /// Check that `poown` proves control of `node_public_key` on behalf of
    /// `owner`, for a transaction processed at `height`.
    fn verify(
        &self,
        state: &dyn StateView,
        poown: &ProofOfOwnership,
        node_public_key: &NodePublicKey,
        owner: &AccountAddress,
        height: u32,
    ) -> Result<(), TransactionError>;
}

/// Default verifier: checks the owner, the referenced block and the
/// Ed25519 signature.
#[derive(Debug, Clone, Copy)]
pub struct PoownVerifier {
    max_age: u32,
}

impl PoownVerifier {
    pub fn new(max_age: u32) -> Self {
        Self { max_age }
    }
}

impl OwnershipVerifier for PoownVerifier {
    fn verify(
        &self,
        state: &dyn StateView,
        poown: &ProofOfOwnership,
        node_public_key: &NodePublicKey,
        owner: &AccountAddress,
        height: u32,
    ) -> Result<(), TransactionError> {
        let message = &poown.message;
        if &message.account != owner {
            return Err(TransactionError::Validation(Reason::PoownAccountMismatch));
        }
        if message.block_height > height || height - message.block_height > self.max_age {
            return Err(TransactionError::Validation(Reason::PoownBlockOutOfRange));
        }
        match state.block_hash(message.block_height)? {
            Some(hash) if hash == message.block_hash => {}
            _ => return Err(TransactionError::Validation(Reason::PoownBlockMismatch)),
        }
        if !node_public_key.verify(&message.to_bytes(), &poown.signature) {
            return Err(TransactionError::Validation(Reason::InvalidPoownSignature));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerState, MemoryLedger};

    fn setup() -> (MemoryLedger, NodeKeypair, AccountAddress) {
        let ledger = MemoryLedger::new();
        ledger.put_block_hash(10, [3; 32]).unwrap();
        (ledger, NodeKeypair::from_seed(&[1; 32]), AccountAddress::from("alice"))
    }

    fn reason(result: Result<(), TransactionError>) -> Reason {
        match result {
            Err(TransactionError::Validation(r)) => r,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn encoding_round_trips_with_fixed_signature() {
        let (_, kp, alice) = setup();
        let poown = ProofOfOwnership::sign(&kp, alice, [3; 32], 10);
        let bytes = poown.to_bytes();
        assert_eq!(bytes.len() as u32, poown.size());
        assert_eq!(ProofOfOwnership::parse(&bytes).unwrap(), poown);
    }

    #[test]
    fn valid_proof_passes() {
        let (ledger, kp, alice) = setup();
        let poown = ProofOfOwnership::sign(&kp, alice.clone(), [3; 32], 10);
        PoownVerifier::new(10)
            .verify(&ledger, &poown, &kp.public_key(), &alice, 12)
            .unwrap();
    }

    #[test]
    fn wrong_owner_is_rejected() {
        let (ledger, kp, alice) = setup();
        let poown = ProofOfOwnership::sign(&kp, alice, [3; 32], 10);
        let bob = AccountAddress::from("bob");
        assert_eq!(
            reason(PoownVerifier::new(10).verify(&ledger, &poown, &kp.public_key(), &bob, 12)),
            Reason::PoownAccountMismatch
        );
    }

    #[test]
    fn stale_and_future_blocks_are_rejected() {
        let (ledger, kp, alice) = setup();
        let poown = ProofOfOwnership::sign(&kp, alice.clone(), [3; 32], 10);
        let verifier = PoownVerifier::new(5);
        assert_eq!(
            reason(verifier.verify(&ledger, &poown, &kp.public_key(), &alice, 16)),
            Reason::PoownBlockOutOfRange
        );
        assert_eq!(
            reason(verifier.verify(&ledger, &poown, &kp.public_key(), &alice, 9)),
            Reason::PoownBlockOutOfRange
        );
    }

    #[test]
    fn unknown_block_hash_is_rejected() {
        let (ledger, kp, alice) = setup();
        let poown = ProofOfOwnership::sign(&kp, alice.clone(), [4; 32], 10);
        assert_eq!(
            reason(PoownVerifier::new(10).verify(&ledger, &poown, &kp.public_key(), &alice, 12)),
            Reason::PoownBlockMismatch
        );
    }

    #[test]
    fn signature_from_another_key_is_rejected() {
        let (ledger, kp, alice) = setup();
        let poown = ProofOfOwnership::sign(&kp, alice.clone(), [3; 32], 10);
        let other = NodeKeypair::from_seed(&[2; 32]).public_key();
        assert_eq!(
            reason(PoownVerifier::new(10).verify(&ledger, &poown, &other, &alice, 12)),
            Reason::InvalidPoownSignature
        );
    }
}
