//! Type (7,1): reveal a previously committed fee vote.
//!
//! The vote info is `recent_block_hash | recent_block_height | fee_vote`.
//! Its `sha256` must equal the hash committed in the same period, and the
//! node key of the voter must have signed it.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{ensure_spendable, ledger_context, selected_bodies};
use crate::config::BLOCK_HASH_LENGTH;
use crate::crypto::hash::sha256_array;
use crate::crypto::keys::Signature;
use crate::governance::{FeeVotePhase, VoteWindow};
use crate::ledger::{ChangeSet, FeeVoteRevealRecord, LedgerEvent, Mutation, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{prefixed_size, put_prefixed, BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::Dependencies;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::{BlockHash, TransactionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeVoteRevealBody {
    #[serde(with = "hex::serde")]
    pub recent_block_hash: BlockHash,
    pub recent_block_height: u32,
    pub fee_vote: i64,
    pub voter_signature: Signature,
}

impl FeeVoteRevealBody {
    /// The signed and committed part of the body.
    pub fn vote_info_bytes(&self) -> Vec<u8> {
        vote_info_bytes(&self.recent_block_hash, self.recent_block_height, self.fee_vote)
    }
}

pub fn vote_info_bytes(recent_block_hash: &BlockHash, recent_block_height: u32, fee_vote: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BLOCK_HASH_LENGTH + 12);
    buf.put_slice(recent_block_hash);
    buf.put_u32_le(recent_block_height);
    buf.put_i64_le(fee_vote);
    buf
}

impl BodyCodec for FeeVoteRevealBody {
    fn size(&self) -> u32 {
        (BLOCK_HASH_LENGTH + 4 + 8 + prefixed_size(self.voter_signature.len())) as u32
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(&self.recent_block_hash);
        buf.put_u32_le(self.recent_block_height);
        buf.put_i64_le(self.fee_vote);
        put_prefixed(buf, self.voter_signature.as_bytes());
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            recent_block_hash: reader.array32("recent_block_hash")?,
            recent_block_height: reader.u32("recent_block_height")?,
            fee_vote: reader.i64("fee_vote")?,
            voter_signature: Signature::from_bytes(reader.prefixed("voter_signature")?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FeeVoteReveal {
    tx: Transaction,
    body: FeeVoteRevealBody,
    deps: Dependencies,
}

impl FeeVoteReveal {
    pub fn new(tx: Transaction, body: FeeVoteRevealBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn window(&self, post_transaction: bool) -> Result<VoteWindow, TransactionError> {
        self.deps
            .vote_phase
            .current_window(self.tx.height, post_transaction)
            .ok_or(TransactionError::Validation(Reason::InvalidFeeVotePhase))
    }

    fn check_recent_block(
        &self,
        state: &dyn StateView,
        window: &VoteWindow,
    ) -> Result<(), TransactionError> {
        let height = self.body.recent_block_height;
        if height < window.period_start_height || height > self.tx.height {
            return Err(TransactionError::Validation(Reason::InvalidRecentBlock));
        }
        match state.block_hash(height)? {
            Some(hash) if hash == self.body.recent_block_hash => Ok(()),
            _ => Err(TransactionError::Validation(Reason::InvalidRecentBlock)),
        }
    }
}

impl TransactionAction for FeeVoteReveal {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        if self.body.fee_vote < 0 {
            return Err(TransactionError::Validation(Reason::InvalidFeeVote));
        }
        let node = state
            .node_by_account(&self.tx.sender)?
            .ok_or(TransactionError::Validation(Reason::SenderAccountNotNodeOwner))?;
        let window = self.window(in_db_transaction)?;
        if state
            .fee_vote_reveal(&self.tx.sender, window.period_start_height)?
            .is_some()
        {
            return Err(TransactionError::Validation(
                Reason::DuplicatedFeeVoteReveal,
            ));
        }
        if window.phase_at(self.tx.timestamp) != Some(FeeVotePhase::Reveal) {
            return Err(TransactionError::Validation(Reason::InvalidFeeVotePhase));
        }
        self.check_recent_block(state, &window)?;

        let commit = state
            .fee_vote_commit(&self.tx.sender, window.period_start_height)?
            .ok_or(TransactionError::NotFound(Reason::FeeVoteCommitNotFound))?;
        let info = self.body.vote_info_bytes();
        if sha256_array(&info) != commit.vote_hash {
            return Err(TransactionError::Validation(Reason::FeeVoteHashMismatch));
        }
        if !self
            .deps
            .signatures
            .verify(&node.public_key, &info, &self.body.voter_signature)
        {
            return Err(TransactionError::Validation(Reason::InvalidVoterSignature));
        }
        if !in_db_transaction {
            ensure_spendable(state, &self.tx.sender, self.tx.fee)?;
        }
        Ok(())
    }

    fn apply_unconfirmed(&self, _state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let mut changes = ChangeSet::new();
        changes.reserve(&self.tx.sender, self.tx.fee);
        Ok(changes)
    }

    fn undo_apply_unconfirmed(&self, _state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let mut changes = ChangeSet::new();
        changes.release(&self.tx.sender, self.tx.fee);
        Ok(changes)
    }

    fn apply_confirmed(
        &self,
        _state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let window = self.window(true)?;
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::FeeVoteReveal);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.tx.fee, ctx);
        changes.push(Mutation::PutFeeVoteReveal(FeeVoteRevealRecord {
            voter: self.tx.sender.clone(),
            recent_block_hash: self.body.recent_block_hash,
            recent_block_height: self.body.recent_block_height,
            fee_vote: self.body.fee_vote,
            signature: self.body.voter_signature.clone(),
            period_start: window.period_start_height,
            block_height: self.tx.height,
        }));
        Ok(changes)
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.deps.fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(FeeVoteReveal, FeeVoteRevealBody);

    fn skip_mempool_transaction(
        &self,
        selected: &[Transaction],
        new_block_timestamp: i64,
        new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        let in_phase = self
            .deps
            .vote_phase
            .current_window(new_block_height, true)
            .and_then(|w| w.phase_at(new_block_timestamp))
            == Some(FeeVotePhase::Reveal);
        if !in_phase {
            return Ok(true);
        }
        Ok(
            selected_bodies::<FeeVoteRevealBody>(selected, TransactionType::FeeVoteReveal)
                .any(|(tx, _)| tx.id != self.tx.id && tx.sender == self.tx.sender),
        )
    }
}
