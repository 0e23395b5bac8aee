//! Type (1,0): plain value transfer, optionally escrowed.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{checked_total, ensure_spendable, ledger_context};
use crate::ledger::{ChangeSet, EscrowRecord, EscrowStatus, LedgerContext, LedgerEvent, Mutation, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::Dependencies;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::escrow::{escrow_terms, validate_terms, EscrowApproval, EscrowTypeAction};
use crate::transaction::types::AccountAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMoneyBody {
    pub amount: i64,
}

impl BodyCodec for SendMoneyBody {
    fn size(&self) -> u32 {
        8
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_i64_le(self.amount);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: reader.i64("amount")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SendMoney {
    tx: Transaction,
    body: SendMoneyBody,
    deps: Dependencies,
}

impl SendMoney {
    pub fn new(tx: Transaction, body: SendMoneyBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn recipient(&self) -> Result<&AccountAddress, TransactionError> {
        self.tx
            .recipient
            .as_ref()
            .filter(|r| !r.is_empty())
            .ok_or(TransactionError::Validation(Reason::MissingRecipient))
    }

    fn check_parties(&self) -> Result<(), TransactionError> {
        if self.tx.sender.is_empty() {
            return Err(TransactionError::Validation(Reason::MissingSender));
        }
        self.recipient().map(|_| ())
    }

    fn total(&self) -> Result<i64, TransactionError> {
        checked_total(&[self.body.amount, self.tx.fee])
    }

    /// Amount, fee and the approver's commission.
    fn escrow_total(&self) -> Result<i64, TransactionError> {
        let commission = escrow_terms(&self.tx).map_or(0, |t| t.commission);
        checked_total(&[self.body.amount, self.tx.fee, commission])
    }
}

impl TransactionAction for SendMoney {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        if self.body.amount <= 0 {
            return Err(TransactionError::Validation(Reason::AmountNotPositive));
        }
        // Genesis transfers carry no parties.
        if self.tx.height > 0 {
            self.check_parties()?;
        }
        if !in_db_transaction && !self.tx.sender.is_empty() {
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
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::SendMoney);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.total()?, ctx);
        changes.credit(self.recipient()?, self.body.amount, ctx);
        Ok(changes)
    }

    fn amount(&self) -> i64 {
        self.body.amount
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        if escrow_terms(&self.tx).is_some() {
            self.deps.escrow_fee_model.minimum_fee(&self.tx)
        } else {
            self.deps.fee_model.minimum_fee(&self.tx)
        }
    }

    body_accessors!(SendMoney, SendMoneyBody);

    fn escrowable(&self) -> Option<&dyn EscrowTypeAction> {
        escrow_terms(&self.tx).map(|_| self as &dyn EscrowTypeAction)
    }
}

impl EscrowTypeAction for SendMoney {
    fn escrow_validate(
        &self,
        state: &dyn StateView,
        in_db_transaction: bool,
    ) -> Result<(), TransactionError> {
        if self.body.amount <= 0 {
            return Err(TransactionError::Validation(Reason::AmountNotPositive));
        }
        self.check_parties()?;
        validate_terms(&self.tx)?;
        if !in_db_transaction {
            ensure_spendable(state, &self.tx.sender, self.escrow_total()?)?;
        }
        Ok(())
    }

    fn escrow_apply_unconfirmed(&self, _state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        let mut changes = ChangeSet::new();
        changes.reserve(&self.tx.sender, self.escrow_total()?);
        Ok(changes)
    }

    fn escrow_undo_apply_unconfirmed(
        &self,
        _state: &dyn StateView,
    ) -> Result<ChangeSet, TransactionError> {
        let mut changes = ChangeSet::new();
        changes.release(&self.tx.sender, self.escrow_total()?);
        Ok(changes)
    }

    fn escrow_apply_confirmed(
        &self,
        _state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let terms = validate_terms(&self.tx)?;
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::EscrowLocked);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.escrow_total()?, ctx);
        changes.push(Mutation::PutEscrow(EscrowRecord {
            id: self.tx.id,
            sender: self.tx.sender.clone(),
            recipient: self.recipient()?.clone(),
            approver: terms.approver.clone(),
            amount: self.body.amount,
            commission: terms.commission,
            timeout: terms.timeout,
            status: EscrowStatus::Pending,
            block_height: self.tx.height,
            instruction: terms.instruction.clone(),
        }));
        Ok(changes)
    }

    fn escrow_approval(
        &self,
        state: &dyn StateView,
        approval: EscrowApproval,
        block_height: u32,
        block_timestamp: i64,
        approval_transaction_id: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let mut record = state
            .escrow(self.tx.id)?
            .ok_or(TransactionError::NotFound(Reason::EscrowNotFound))?;
        if record.status != EscrowStatus::Pending {
            return Err(TransactionError::Validation(Reason::EscrowNotPending));
        }

        let ctx = LedgerContext {
            transaction_id: approval_transaction_id,
            block_height,
            timestamp: block_timestamp,
            event: LedgerEvent::EscrowSettled,
        };
        let mut changes = ChangeSet::new();
        record.status = match approval {
            EscrowApproval::Approve => {
                changes.credit(&record.recipient, record.amount, ctx);
                changes.credit(&record.approver, record.commission, ctx);
                EscrowStatus::Approved
            }
            EscrowApproval::Reject => {
                changes.credit(&record.sender, record.amount, ctx);
                changes.credit(&record.approver, record.commission, ctx);
                EscrowStatus::Rejected
            }
            EscrowApproval::Expire => {
                let refund = checked_total(&[record.amount, record.commission])?;
                changes.credit(&record.sender, refund, ctx);
                EscrowStatus::Expired
            }
        };
        changes.push(Mutation::PutEscrow(record));
        Ok(changes)
    }
}
