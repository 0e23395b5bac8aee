//! Type (2,0): register a node and lock a stake behind it.

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
use crate::transaction::types::{AccountAddress, TransactionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistrationBody {
    pub node_public_key: NodePublicKey,
    /// Account that will own the node.
    pub account: AccountAddress,
    pub node_address: String,
    pub locked_balance: i64,
    pub poown: ProofOfOwnership,
}

impl BodyCodec for NodeRegistrationBody {
    fn size(&self) -> u32 {
        (NODE_PUBLIC_KEY_LENGTH
            + prefixed_size(self.account.len())
            + prefixed_size(self.node_address.len())
            + 8) as u32
            + self.poown.size()
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.node_public_key.as_bytes());
        put_prefixed(buf, self.account.as_bytes());
        put_prefixed(buf, self.node_address.as_bytes());
        buf.put_i64_le(self.locked_balance);
        self.poown.write_to(buf);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            node_public_key: NodePublicKey::from_bytes(reader.array32("node_public_key")?),
            account: AccountAddress::new(reader.prefixed("account")?),
            node_address: reader.prefixed_string("node_address")?,
            locked_balance: reader.i64("locked_balance")?,
            poown: ProofOfOwnership::read_from(reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NodeRegistration {
    tx: Transaction,
    body: NodeRegistrationBody,
    deps: Dependencies,
}

impl NodeRegistration {
    pub fn new(tx: Transaction, body: NodeRegistrationBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn total(&self) -> Result<i64, TransactionError> {
        checked_total(&[self.body.locked_balance, self.tx.fee])
    }
}

impl TransactionAction for NodeRegistration {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        let body = &self.body;
        if body.locked_balance < 0 {
            return Err(TransactionError::Validation(Reason::NegativeLockedBalance));
        }
        self.deps.ownership.verify(
            state,
            &body.poown,
            &body.node_public_key,
            &body.account,
            self.tx.height,
        )?;
        if state.node_by_account(&body.account)?.is_some() {
            return Err(TransactionError::Validation(Reason::AccountAlreadyNodeOwner));
        }
        // Released rows still hold their key; they are claimed, not
        // registered again.
        if state.node_by_public_key(&body.node_public_key)?.is_some() {
            return Err(TransactionError::Validation(
                Reason::NodePublicKeyAlreadyRegistered,
            ));
        }
        if !body.node_address.is_empty() {
            validate_node_address(&body.node_address)?;
        }
        if !in_db_transaction {
            ensure_spendable(state, &self.tx.sender, self.total()?)?;
        }
        Ok(())
    }

    fn apply_unconfirmed(&self, _state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let mut changes = ChangeSet::new();
        changes.reserve(&self.tx.sender, self.total()?);
        Ok(changes)
    }

    fn undo_apply_unconfirmed(&self, _state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let mut changes = ChangeSet::new();
        changes.release(&self.tx.sender, self.total()?);
        Ok(changes)
    }

    fn apply_confirmed(
        &self,
        _state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::NodeRegistration);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.total()?, ctx);
        changes.push(Mutation::PutNodeRecord(NodeRecord {
            node_id: self.tx.id,
            account: self.body.account.clone(),
            public_key: self.body.node_public_key,
            address: self.body.node_address.clone(),
            locked_balance: self.body.locked_balance,
            registration_height: self.tx.height,
            height: self.tx.height,
            queued: true,
            latest: true,
        }));
        Ok(changes)
    }

    fn amount(&self) -> i64 {
        self.body.locked_balance
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.deps.fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(NodeRegistration, NodeRegistrationBody);

    /// Only one registration per key or owner fits in a block.
    fn skip_mempool_transaction(
        &self,
        selected: &[Transaction],
        _new_block_timestamp: i64,
        _new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        Ok(
            selected_bodies::<NodeRegistrationBody>(selected, TransactionType::NodeRegistration)
                .any(|(tx, body)| {
                    tx.id != self.tx.id
                        && (body.node_public_key == self.body.node_public_key
                            || body.account == self.body.account)
                }),
        )
    }
}
