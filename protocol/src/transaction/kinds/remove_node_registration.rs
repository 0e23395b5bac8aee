//! Type (2,2): release a node and refund its stake.
//!
//! The row is not deleted. It is handed to the all-zero sentinel owner with
//! its address cleared, which leaves the key claimable.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{checked_total, ensure_spendable, ledger_context};
use crate::config::NODE_PUBLIC_KEY_LENGTH;
use crate::crypto::keys::NodePublicKey;
use crate::ledger::{ChangeSet, LedgerEvent, Mutation, NodeRecord, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::Dependencies;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::AccountAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveNodeRegistrationBody {
    pub node_public_key: NodePublicKey,
}

impl BodyCodec for RemoveNodeRegistrationBody {
    fn size(&self) -> u32 {
        NODE_PUBLIC_KEY_LENGTH as u32
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.node_public_key.as_bytes());
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            node_public_key: NodePublicKey::from_bytes(reader.array32("node_public_key")?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RemoveNodeRegistration {
    tx: Transaction,
    body: RemoveNodeRegistrationBody,
    deps: Dependencies,
}

impl RemoveNodeRegistration {
    pub fn new(tx: Transaction, body: RemoveNodeRegistrationBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn owned_row(&self, state: &dyn StateView) -> Result<NodeRecord, TransactionError> {
        let row = state
            .node_by_public_key(&self.body.node_public_key)?
            .ok_or(TransactionError::NotFound(Reason::NodeNotFoundWithPublicKey))?;
        if row.account != self.tx.sender {
            return Err(TransactionError::Authorization(Reason::SenderNotNodeOwner));
        }
        Ok(row)
    }
}

impl TransactionAction for RemoveNodeRegistration {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        self.owned_row(state)?;
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
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let row = self.owned_row(state)?;
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::RemoveNodeRegistration);
        let refund = checked_total(&[row.locked_balance, -self.tx.fee])?;

        let mut changes = ChangeSet::new();
        changes.adjust(&self.tx.sender, refund, row.locked_balance, ctx);
        changes.push(Mutation::PutNodeRecord(NodeRecord {
            account: AccountAddress::sentinel(),
            address: String::new(),
            locked_balance: 0,
            height: self.tx.height,
            queued: true,
            latest: true,
            ..row
        }));
        Ok(changes)
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.deps.fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(RemoveNodeRegistration, RemoveNodeRegistrationBody);
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{balances, dispatch, keypair, ledger, register_node, HEIGHT};
    use super::*;
    use crate::ledger::LedgerState;
    use crate::transaction::error::ErrorKind;
    use crate::transaction::types::TransactionType;
    use crate::transaction::TransactionBuilder;

    fn remove(sender: &str, seed: u8) -> Transaction {
        TransactionBuilder::new(TransactionType::RemoveNodeRegistration)
            .sender(sender)
            .fee(10)
            .height(HEIGHT)
            .body(RemoveNodeRegistrationBody {
                node_public_key: keypair(seed).public_key(),
            })
            .build()
    }

    #[test]
    fn only_the_owner_may_remove() {
        let state = ledger(&[("bob", 100)]);
        register_node(&state, 7, "alice", &keypair(1), 300);
        let err = dispatch(&remove("bob", 1)).validate(&state, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.code(), "SenderNotNodeOwner");
    }

    #[test]
    fn unknown_key_is_not_found() {
        let state = ledger(&[("alice", 100)]);
        let err = dispatch(&remove("alice", 1)).validate(&state, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn removal_releases_row_and_refunds_stake() {
        let state = ledger(&[("alice", 100)]);
        register_node(&state, 7, "alice", &keypair(1), 300);
        let action = dispatch(&remove("alice", 1));

        action.validate(&state, false).unwrap();
        state.commit(&action.apply_unconfirmed(&state).unwrap()).unwrap();
        assert_eq!(balances(&state, "alice"), (100, 90));
        state.commit(&action.apply_confirmed(&state, 5).unwrap()).unwrap();
        assert_eq!(balances(&state, "alice"), (390, 390));

        assert!(state.node_by_account(&"alice".into()).unwrap().is_none());
        let row = state
            .node_by_public_key(&keypair(1).public_key())
            .unwrap()
            .unwrap();
        assert!(row.is_released());
        assert!(row.queued);
        assert_eq!(row.address, "");
        assert_eq!(row.locked_balance, 0);
    }
}
