//! Type (2,3): take over a released node.
//!
//! A released row (owned by the sentinel after a removal) keeps its key.
//! Whoever proves control of that key can retarget the row to a new owner
//! account, locking a stake at least as large as the row carries.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{checked_total, ensure_spendable, ledger_context};
use crate::auth::ProofOfOwnership;
use crate::config::NODE_PUBLIC_KEY_LENGTH;
use crate::crypto::keys::NodePublicKey;
use crate::ledger::{ChangeSet, LedgerEvent, Mutation, NodeRecord, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{prefixed_size, put_prefixed, BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::Dependencies;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::AccountAddress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimNodeRegistrationBody {
    pub node_public_key: NodePublicKey,
    /// New owner of the node.
    pub account: AccountAddress,
    /// Zero keeps the row's current stake.
    pub locked_balance: i64,
    pub poown: ProofOfOwnership,
}

impl BodyCodec for ClaimNodeRegistrationBody {
    fn size(&self) -> u32 {
        (NODE_PUBLIC_KEY_LENGTH + prefixed_size(self.account.len()) + 8) as u32 + self.poown.size()
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(self.node_public_key.as_bytes());
        put_prefixed(buf, self.account.as_bytes());
        buf.put_i64_le(self.locked_balance);
        self.poown.write_to(buf);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            node_public_key: NodePublicKey::from_bytes(reader.array32("node_public_key")?),
            account: AccountAddress::new(reader.prefixed("account")?),
            locked_balance: reader.i64("locked_balance")?,
            poown: ProofOfOwnership::read_from(reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClaimNodeRegistration {
    tx: Transaction,
    body: ClaimNodeRegistrationBody,
    deps: Dependencies,
}

impl ClaimNodeRegistration {
    pub fn new(tx: Transaction, body: ClaimNodeRegistrationBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn released_row(&self, state: &dyn StateView) -> Result<NodeRecord, TransactionError> {
        let row = state
            .node_by_public_key(&self.body.node_public_key)?
            .ok_or(TransactionError::NotFound(Reason::NodeNotFoundWithPublicKey))?;
        if !row.is_released() {
            return Err(TransactionError::Validation(
                Reason::NodePublicKeyAlreadyRegistered,
            ));
        }
        Ok(row)
    }

    fn locked_balance(&self, row: &NodeRecord) -> i64 {
        if self.body.locked_balance == 0 {
            row.locked_balance
        } else {
            self.body.locked_balance
        }
    }

    fn charge(&self, row: &NodeRecord) -> Result<i64, TransactionError> {
        let locked = self.locked_balance(row);
        if locked < row.locked_balance {
            return Err(TransactionError::Validation(
                Reason::LockedBalanceLessThenPreviouslyLocked,
            ));
        }
        checked_total(&[locked, -row.locked_balance, self.tx.fee])
    }
}

impl TransactionAction for ClaimNodeRegistration {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        let row = self.released_row(state)?;
        if state.node_by_account(&self.body.account)?.is_some() {
            return Err(TransactionError::Validation(Reason::AccountAlreadyNodeOwner));
        }
        self.deps.ownership.verify(
            state,
            &self.body.poown,
            &self.body.node_public_key,
            &self.body.account,
            self.tx.height,
        )?;
        let charge = self.charge(&row)?;
        if !in_db_transaction {
            ensure_spendable(state, &self.tx.sender, charge)?;
        }
        Ok(())
    }

    fn apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let row = self.released_row(state)?;
        let mut changes = ChangeSet::new();
        changes.reserve(&self.tx.sender, self.charge(&row)?);
        Ok(changes)
    }

    fn undo_apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let row = self.released_row(state)?;
        let mut changes = ChangeSet::new();
        changes.release(&self.tx.sender, self.charge(&row)?);
        Ok(changes)
    }

    fn apply_confirmed(
        &self,
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let row = self.released_row(state)?;
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::ClaimNodeRegistration);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.charge(&row)?, ctx);
        changes.push(Mutation::PutNodeRecord(NodeRecord {
            account: self.body.account.clone(),
            locked_balance: self.locked_balance(&row),
            height: self.tx.height,
            queued: true,
            latest: true,
            ..row
        }));
        Ok(changes)
    }

    fn amount(&self) -> i64 {
        self.body.locked_balance
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.deps.fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(ClaimNodeRegistration, ClaimNodeRegistrationBody);
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{balances, dispatch, keypair, ledger, poown, register_node, HEIGHT};
    use super::*;
    use crate::ledger::LedgerState;
    use crate::transaction::error::ErrorKind;
    use crate::transaction::types::TransactionType;
    use crate::transaction::TransactionBuilder;

    fn claim(claimant: &str, seed: u8, locked: i64) -> Transaction {
        let kp = keypair(seed);
        TransactionBuilder::new(TransactionType::ClaimNodeRegistration)
            .sender(claimant)
            .fee(10)
            .height(HEIGHT)
            .body(ClaimNodeRegistrationBody {
                node_public_key: kp.public_key(),
                account: claimant.into(),
                locked_balance: locked,
                poown: poown(&kp, claimant),
            })
            .build()
    }

    fn released(state: &crate::ledger::MemoryLedger, seed: u8) {
        register_node(state, 7, "alice", &keypair(seed), 0);
        let mut changes = ChangeSet::new();
        let row = state.node_by_account(&"alice".into()).unwrap().unwrap();
        changes.push(Mutation::PutNodeRecord(NodeRecord {
            account: AccountAddress::sentinel(),
            address: String::new(),
            queued: true,
            ..row
        }));
        state.commit(&changes).unwrap();
    }

    #[test]
    fn active_node_cannot_be_claimed() {
        let state = ledger(&[("bob", 1_000)]);
        register_node(&state, 7, "alice", &keypair(1), 100);
        let err = dispatch(&claim("bob", 1, 0)).validate(&state, false).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::NodePublicKeyAlreadyRegistered));
    }

    #[test]
    fn unknown_key_cannot_be_claimed() {
        let state = ledger(&[("bob", 1_000)]);
        let err = dispatch(&claim("bob", 1, 0)).validate(&state, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn claimant_may_not_own_another_node() {
        let state = ledger(&[("bob", 1_000)]);
        released(&state, 1);
        register_node(&state, 8, "bob", &keypair(2), 0);
        let err = dispatch(&claim("bob", 1, 0)).validate(&state, false).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::AccountAlreadyNodeOwner));
    }

    #[test]
    fn claim_retargets_released_row() {
        let state = ledger(&[("bob", 1_000)]);
        released(&state, 1);
        let action = dispatch(&claim("bob", 1, 200));

        action.validate(&state, false).unwrap();
        state.commit(&action.apply_unconfirmed(&state).unwrap()).unwrap();
        assert_eq!(balances(&state, "bob"), (1_000, 790));
        state.commit(&action.apply_confirmed(&state, 5).unwrap()).unwrap();
        assert_eq!(balances(&state, "bob"), (790, 790));

        let row = state.node_by_account(&"bob".into()).unwrap().unwrap();
        assert_eq!(row.node_id, 7);
        assert_eq!(row.locked_balance, 200);
        assert!(row.queued);
    }
}
