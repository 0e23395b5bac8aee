//! Type (4,0): the approver's decision on an escrowed transaction.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{ensure_spendable, ledger_context, selected_bodies};
use crate::ledger::{ChangeSet, EscrowRecord, EscrowStatus, LedgerEvent, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::TypeDispatcher;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::escrow::EscrowApproval;
use crate::transaction::types::TransactionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEscrowBody {
    pub approval: EscrowApproval,
    /// Id of the escrowed transaction.
    pub transaction_id: i64,
}

impl BodyCodec for ApprovalEscrowBody {
    fn size(&self) -> u32 {
        4 + 8
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_u32_le(self.approval.wire_code());
        buf.put_i64_le(self.transaction_id);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            approval: EscrowApproval::from_wire(reader.u32("approval")?)?,
            transaction_id: reader.i64("transaction_id")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApprovalEscrow {
    tx: Transaction,
    body: ApprovalEscrowBody,
    dispatcher: TypeDispatcher,
}

impl ApprovalEscrow {
    pub fn new(tx: Transaction, body: ApprovalEscrowBody, dispatcher: TypeDispatcher) -> Self {
        Self {
            tx,
            body,
            dispatcher,
        }
    }

    fn pending_escrow(&self, state: &dyn StateView) -> Result<EscrowRecord, TransactionError> {
        let record = state
            .escrow(self.body.transaction_id)?
            .ok_or(TransactionError::NotFound(Reason::EscrowNotFound))?;
        if record.status != EscrowStatus::Pending {
            return Err(TransactionError::Validation(Reason::EscrowNotPending));
        }
        Ok(record)
    }
}

impl TransactionAction for ApprovalEscrow {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        let record = self.pending_escrow(state)?;
        if record.approver != self.tx.sender {
            return Err(TransactionError::Authorization(
                Reason::SenderNotEscrowApprover,
            ));
        }
        if self.tx.height > record.timeout {
            return Err(TransactionError::Validation(Reason::EscrowApprovalTimedOut));
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
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::ApprovalEscrow);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.tx.fee, ctx);

        let escrowed = state
            .transaction(self.body.transaction_id)?
            .ok_or(TransactionError::NotFound(Reason::EscrowedTransactionNotFound))?;
        let action = self
            .dispatcher
            .dispatch(&escrowed)?
            .ok_or(TransactionError::Validation(Reason::NotEscrowable))?;
        let hooks = action
            .escrowable()
            .ok_or(TransactionError::Validation(Reason::NotEscrowable))?;
        changes.extend(hooks.escrow_approval(
            state,
            self.body.approval,
            self.tx.height,
            block_timestamp,
            self.tx.id,
        )?);
        Ok(changes)
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.dispatcher.dependencies().fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(ApprovalEscrow, ApprovalEscrowBody);

    /// One decision per escrow per block.
    fn skip_mempool_transaction(
        &self,
        selected: &[Transaction],
        _new_block_timestamp: i64,
        _new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        Ok(
            selected_bodies::<ApprovalEscrowBody>(selected, TransactionType::ApprovalEscrow)
                .any(|(tx, body)| {
                    tx.id != self.tx.id && body.transaction_id == self.body.transaction_id
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{balances, dispatch, ledger, HEIGHT};
    use super::super::send_money::SendMoneyBody;
    use super::*;
    use crate::ledger::{LedgerState, MemoryLedger, Mutation};
    use crate::transaction::error::ErrorKind;
    use crate::transaction::escrow::EscrowTerms;
    use crate::transaction::TransactionBuilder;

    /// Confirm an escrowed 100-unit transfer from alice to bob, approved
    /// by carol for a commission of 5.
    fn open_escrow(state: &MemoryLedger) -> Transaction {
        let tx = TransactionBuilder::new(TransactionType::SendMoney)
            .sender("alice")
            .recipient("bob")
            .fee(10)
            .height(HEIGHT)
            .escrow(EscrowTerms {
                approver: "carol".into(),
                commission: 5,
                timeout: HEIGHT + 10,
                instruction: String::new(),
            })
            .body(SendMoneyBody { amount: 100 })
            .build();
        let action = dispatch(&tx);
        let hooks = action.escrowable().unwrap();
        state.commit(&hooks.escrow_apply_unconfirmed(state).unwrap()).unwrap();
        let mut changes = hooks.escrow_apply_confirmed(state, 100).unwrap();
        changes.push(Mutation::PutTransaction(tx.clone()));
        state.commit(&changes).unwrap();
        tx
    }

    fn decision(sender: &str, approval: EscrowApproval, id: i64) -> Transaction {
        TransactionBuilder::new(TransactionType::ApprovalEscrow)
            .sender(sender)
            .fee(1)
            .height(HEIGHT + 1)
            .body(ApprovalEscrowBody {
                approval,
                transaction_id: id,
            })
            .build()
    }

    #[test]
    fn expiry_is_not_a_wire_decision() {
        let mut bytes = Vec::new();
        bytes.put_u32_le(2);
        bytes.put_i64_le(1);
        assert!(ApprovalEscrowBody::parse(&bytes).is_err());
    }

    #[test]
    fn only_the_approver_decides() {
        let state = ledger(&[("alice", 1_000), ("bob", 10)]);
        let escrowed = open_escrow(&state);
        let err = dispatch(&decision("bob", EscrowApproval::Approve, escrowed.id))
            .validate(&state, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.reason(), Some(Reason::SenderNotEscrowApprover));
    }

    #[test]
    fn unknown_escrow_is_not_found() {
        let state = ledger(&[("carol", 10)]);
        let err = dispatch(&decision("carol", EscrowApproval::Approve, 77))
            .validate(&state, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn rejection_returns_amount_to_sender() {
        let state = ledger(&[("alice", 1_000), ("carol", 10)]);
        let escrowed = open_escrow(&state);
        let action = dispatch(&decision("carol", EscrowApproval::Reject, escrowed.id));

        action.validate(&state, false).unwrap();
        state.commit(&action.apply_unconfirmed(&state).unwrap()).unwrap();
        state.commit(&action.apply_confirmed(&state, 200).unwrap()).unwrap();

        assert_eq!(balances(&state, "alice"), (985, 985));
        assert_eq!(balances(&state, "bob"), (0, 0));
        assert_eq!(balances(&state, "carol"), (14, 14));
        assert_eq!(
            state.escrow(escrowed.id).unwrap().unwrap().status,
            EscrowStatus::Rejected
        );
        assert_eq!(
            action.validate(&state, false).unwrap_err().reason(),
            Some(Reason::EscrowNotPending)
        );
    }

    #[test]
    fn decision_after_timeout_is_rejected() {
        let state = ledger(&[("alice", 1_000), ("carol", 10)]);
        let escrowed = open_escrow(&state);

        let at_timeout = decision("carol", EscrowApproval::Approve, escrowed.id).at_height(HEIGHT + 10);
        dispatch(&at_timeout).validate(&state, true).unwrap();

        let late = at_timeout.at_height(HEIGHT + 11);
        let err = dispatch(&late).validate(&state, true).unwrap_err();
        assert_eq!(err.reason(), Some(Reason::EscrowApprovalTimedOut));
    }

    #[test]
    fn one_decision_per_escrow_per_block() {
        let first = decision("carol", EscrowApproval::Approve, 3);
        let second = dispatch(&decision("carol", EscrowApproval::Reject, 3));
        assert!(second.skip_mempool_transaction(&[first], 0, HEIGHT + 1).unwrap());
    }
}
