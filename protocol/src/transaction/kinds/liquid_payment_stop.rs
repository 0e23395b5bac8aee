//! Type (6,1): settle a liquid payment before its window runs out.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::{ensure_spendable, ledger_context, selected_bodies};
use crate::ledger::{ChangeSet, LedgerEvent, LiquidPaymentRecord, PaymentStatus, StateView};
use crate::transaction::action::{TransactionAction, TypeAction};
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::TypeDispatcher;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::TransactionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidPaymentStopBody {
    /// Id of the LiquidPayment transaction to stop.
    pub transaction_id: i64,
}

impl BodyCodec for LiquidPaymentStopBody {
    fn size(&self) -> u32 {
        8
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_i64_le(self.transaction_id);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            transaction_id: reader.i64("transaction_id")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LiquidPaymentStop {
    tx: Transaction,
    body: LiquidPaymentStopBody,
    dispatcher: TypeDispatcher,
}

impl LiquidPaymentStop {
    pub fn new(tx: Transaction, body: LiquidPaymentStopBody, dispatcher: TypeDispatcher) -> Self {
        Self {
            tx,
            body,
            dispatcher,
        }
    }

    fn payment(&self, state: &dyn StateView) -> Result<LiquidPaymentRecord, TransactionError> {
        state
            .liquid_payment(self.body.transaction_id)?
            .ok_or(TransactionError::NotFound(Reason::LiquidPaymentNotFound))
    }

    /// Settlement of the stopped payment through its own kind.
    fn settle(
        &self,
        state: &dyn StateView,
        record: &LiquidPaymentRecord,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let original = state
            .transaction(record.id)?
            .ok_or(TransactionError::NotFound(Reason::OriginalTransactionNotFound))?;
        match self.dispatcher.dispatch(&original)? {
            Some(TypeAction::LiquidPayment(payment)) => payment.complete_payment(
                state,
                self.tx.height,
                block_timestamp,
                record.applied_time,
            ),
            _ => Err(TransactionError::Validation(
                Reason::OriginalTransactionNotLiquidPayment,
            )),
        }
    }
}

impl TransactionAction for LiquidPaymentStop {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        let record = self.payment(state)?;
        // A stop confirmed after the payment settled still pays its fee.
        if record.status == PaymentStatus::Completed && !in_db_transaction {
            return Err(TransactionError::Validation(
                Reason::LiquidPaymentAlreadyCompleted,
            ));
        }
        if self.tx.sender != record.sender && self.tx.sender != record.recipient {
            return Err(TransactionError::Authorization(
                Reason::LiquidPaymentStopperNotParticipant,
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
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::LiquidPaymentStop);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.tx.fee, ctx);

        let record = self.payment(state)?;
        if record.status == PaymentStatus::Completed {
            tracing::debug!(payment = record.id, "stop on completed payment ignored");
            return Ok(changes);
        }
        changes.extend(self.settle(state, &record, block_timestamp)?);
        Ok(changes)
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.dispatcher.dependencies().fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(LiquidPaymentStop, LiquidPaymentStopBody);

    /// One stop per payment per block.
    fn skip_mempool_transaction(
        &self,
        selected: &[Transaction],
        _new_block_timestamp: i64,
        _new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        Ok(
            selected_bodies::<LiquidPaymentStopBody>(selected, TransactionType::LiquidPaymentStop)
                .any(|(tx, body)| {
                    tx.id != self.tx.id && body.transaction_id == self.body.transaction_id
                }),
        )
    }
}
