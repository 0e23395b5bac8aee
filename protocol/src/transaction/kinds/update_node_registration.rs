//! Type (2,1): change the key, address or stake of an owned node.
//!
//! Fields left unset (all-zero key, empty address) keep their current
//! value. The stake can only grow; the sender pays the increase.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{checked_total, ensure_spendable, ledger_context, selected_bodies, validate_node_address};
use crate::auth::ProofOfOwnership;
use crate::config::NODE_PUBLIC_KEY_LENGTH;
use crate::crypto::keys::NodePublicKey;
use crate::ledger::{ChangeSet, LedgerEvent, Mutation, NodeRecord, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{prefixed_size, put_prefixed, BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::Dependencies;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::TransactionType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNodeRegistrationBody {
    pub node_public_key: NodePublicKey,
    pub node_address: String,
    pub locked_balance: i64,
    pub poown: ProofOfOwnership,
}

impl BodyCodec for UpdateNodeRegistrationBody {
    fn size(&self) -> u32 {
        (NODE_PUBLIC_KEY_LENGTH + prefixed_size(self.node_address.len()) + 8) as u32
            + self.poown.size()
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.node_public_key.as_bytes());
        put_prefixed(buf, self.node_address.as_bytes());
        buf.put_i64_le(self.locked_balance);
        self.poown.write_to(buf);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            node_public_key: NodePublicKey::from_bytes(reader.array32("node_public_key")?),
            node_address: reader.prefixed_string("node_address")?,
            locked_balance: reader.i64("locked_balance")?,
            poown: ProofOfOwnership::read_from(reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UpdateNodeRegistration {
    tx: Transaction,
    body: UpdateNodeRegistrationBody,
    deps: Dependencies,
}

impl UpdateNodeRegistration {
    pub fn new(tx: Transaction, body: UpdateNodeRegistrationBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn current_row(&self, state: &dyn StateView) -> Result<NodeRecord, TransactionError> {
        state
            .node_by_account(&self.tx.sender)?
            .ok_or(TransactionError::NotFound(
                Reason::NodeNotFoundWithAccountAddress,
            ))
    }

    /// Stake increase plus fee, measured against `row`.
    fn charge(&self, row: &NodeRecord) -> Result<i64, TransactionError> {
        let delta = self
            .body
            .locked_balance
            .checked_sub(row.locked_balance)
            .ok_or(TransactionError::Validation(Reason::AmountOverflow))?
            .max(0);
        checked_total(&[delta, self.tx.fee])
    }

    fn claimed_key(&self, row: &NodeRecord) -> NodePublicKey {
        if self.body.node_public_key.is_zero() {
            row.public_key
        } else {
            self.body.node_public_key
        }
    }
}

impl TransactionAction for UpdateNodeRegistration {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        let row = self.current_row(state)?;
        if self.body.locked_balance < row.locked_balance {
            return Err(TransactionError::Validation(
                Reason::LockedBalanceLessThenPreviouslyLocked,
            ));
        }

        let key = self.claimed_key(&row);
        self.deps
            .ownership
            .verify(state, &self.body.poown, &key, &self.tx.sender, self.tx.height)?;

        if !self.body.node_public_key.is_zero() {
            if let Some(other) = state.node_by_public_key(&self.body.node_public_key)? {
                if other.node_id != row.node_id {
                    return Err(TransactionError::Validation(
                        Reason::NodePublicKeyAlreadyRegistered,
                    ));
                }
            }
        }
        if !self.body.node_address.is_empty() {
            validate_node_address(&self.body.node_address)?;
        }
        if !in_db_transaction {
            ensure_spendable(state, &self.tx.sender, self.charge(&row)?)?;
        }
        Ok(())
    }

    fn apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let row = self.current_row(state)?;
        let mut changes = ChangeSet::new();
        changes.reserve(&self.tx.sender, self.charge(&row)?);
        Ok(changes)
    }

    fn undo_apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let row = self.current_row(state)?;
        let mut changes = ChangeSet::new();
        changes.release(&self.tx.sender, self.charge(&row)?);
        Ok(changes)
    }

    fn apply_confirmed(
        &self,
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let row = self.current_row(state)?;
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::UpdateNodeRegistration);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.charge(&row)?, ctx);

        let address = if self.body.node_address.is_empty() {
            row.address.clone()
        } else {
            self.body.node_address.clone()
        };
        changes.push(Mutation::PutNodeRecord(NodeRecord {
            public_key: self.claimed_key(&row),
            address,
            locked_balance: self.body.locked_balance,
            height: self.tx.height,
            latest: true,
            ..row
        }));
        Ok(changes)
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.deps.fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(UpdateNodeRegistration, UpdateNodeRegistrationBody);

    fn skip_mempool_transaction(
        &self,
        selected: &[Transaction],
        _new_block_timestamp: i64,
        _new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        Ok(selected_bodies::<UpdateNodeRegistrationBody>(
            selected,
            TransactionType::UpdateNodeRegistration,
        )
        .any(|(tx, _)| tx.id != self.tx.id && tx.sender == self.tx.sender))
    }
}
