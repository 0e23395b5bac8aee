//! Type (7,0): commit to a fee vote by its hash.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{ensure_spendable, ledger_context, selected_bodies};
use crate::governance::{FeeVotePhase, VoteWindow};
use crate::ledger::{ChangeSet, FeeVoteCommitRecord, LedgerEvent, Mutation, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::Dependencies;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::TransactionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeVoteCommitBody {
    /// `sha256` of the vote info revealed later.
    #[serde(with = "hex::serde")]
    pub vote_hash: [u8; 32],
}

impl BodyCodec for FeeVoteCommitBody {
    fn size(&self) -> u32 {
        32
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(&self.vote_hash);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            vote_hash: reader.array32("vote_hash")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct FeeVoteCommit {
    tx: Transaction,
    body: FeeVoteCommitBody,
    deps: Dependencies,
}

impl FeeVoteCommit {
    pub fn new(tx: Transaction, body: FeeVoteCommitBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn window(&self, post_transaction: bool) -> Result<VoteWindow, TransactionError> {
        self.deps
            .vote_phase
            .current_window(self.tx.height, post_transaction)
            .ok_or(TransactionError::Validation(Reason::InvalidFeeVotePhase))
    }
}

impl TransactionAction for FeeVoteCommit {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        if state.node_by_account(&self.tx.sender)?.is_none() {
            return Err(TransactionError::Validation(
                Reason::SenderAccountNotNodeOwner,
            ));
        }
        let window = self.window(in_db_transaction)?;
        if window.phase_at(self.tx.timestamp) != Some(FeeVotePhase::Commit) {
            return Err(TransactionError::Validation(Reason::InvalidFeeVotePhase));
        }
        if state
            .fee_vote_commit(&self.tx.sender, window.period_start_height)?
            .is_some()
        {
            return Err(TransactionError::Validation(
                Reason::DuplicatedFeeVoteCommit,
            ));
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
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::FeeVoteCommit);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.tx.fee, ctx);
        changes.push(Mutation::PutFeeVoteCommit(FeeVoteCommitRecord {
            voter: self.tx.sender.clone(),
            vote_hash: self.body.vote_hash,
            period_start: window.period_start_height,
            block_height: self.tx.height,
        }));
        Ok(changes)
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.deps.fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(FeeVoteCommit, FeeVoteCommitBody);

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
            == Some(FeeVotePhase::Commit);
        if !in_phase {
            return Ok(true);
        }
        Ok(
            selected_bodies::<FeeVoteCommitBody>(selected, TransactionType::FeeVoteCommit)
                .any(|(tx, _)| tx.id != self.tx.id && tx.sender == self.tx.sender),
        )
    }
}
