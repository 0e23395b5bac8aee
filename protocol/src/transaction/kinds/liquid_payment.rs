//! Type (6,0): a payment that streams to the recipient over a time window.
//!
//! Confirmation parks `amount` in a pending payment record. The payment is
//! settled exactly once, either by block production when the window has
//! elapsed or early by a LiquidPaymentStop. Settlement pays the recipient
//! the share of the window that has elapsed and refunds the rest.

use bytes::BufMut;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{checked_total, ensure_spendable, ledger_context};
use crate::ledger::{
    ChangeSet, LedgerContext, LedgerEvent, LiquidPaymentRecord, Mutation, PaymentStatus, StateView,
};
use crate::transaction::action::TransactionAction;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::{BodyCodec, BodyReader, CodecError};
use crate::transaction::dispatcher::Dependencies;
use crate::transaction::error::{Reason, TransactionError};
use crate::transaction::types::AccountAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidPaymentBody {
    pub amount: i64,
    pub complete_minutes: u64,
}

impl BodyCodec for LiquidPaymentBody {
    fn size(&self) -> u32 {
        16
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.put_i64_le(self.amount);
        buf.put_u64_le(self.complete_minutes);
    }

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            amount: reader.i64("amount")?,
            complete_minutes: reader.u64("complete_minutes")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LiquidPayment {
    tx: Transaction,
    body: LiquidPaymentBody,
    deps: Dependencies,
}

impl LiquidPayment {
    pub fn new(tx: Transaction, body: LiquidPaymentBody, deps: Dependencies) -> Self {
        Self { tx, body, deps }
    }

    fn recipient(&self) -> Result<&AccountAddress, TransactionError> {
        self.tx
            .recipient
            .as_ref()
            .filter(|r| !r.is_empty())
            .ok_or(TransactionError::Validation(Reason::MissingRecipient))
    }

    fn total(&self) -> Result<i64, TransactionError> {
        checked_total(&[self.body.amount, self.tx.fee])
    }

    /// Settle the payment at the given block.
    ///
    /// Completing an already completed payment changes nothing.
    pub fn complete_payment(
        &self,
        state: &dyn StateView,
        block_height: u32,
        block_timestamp: i64,
        first_applied_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        if block_timestamp < first_applied_timestamp {
            return Err(TransactionError::Validation(
                Reason::PaymentTimestampBeforeApplied,
            ));
        }
        let mut record = state
            .liquid_payment(self.tx.id)?
            .ok_or(TransactionError::NotFound(Reason::LiquidPaymentNotFound))?;
        if record.status == PaymentStatus::Completed {
            return Ok(ChangeSet::new());
        }

        let elapsed = elapsed_seconds(first_applied_timestamp, block_timestamp)?;
        let share = recipient_share(record.amount, record.complete_minutes, elapsed);
        let ctx = LedgerContext {
            transaction_id: self.tx.id,
            block_height,
            timestamp: block_timestamp,
            event: LedgerEvent::LiquidPaymentSettled,
        };

        let mut changes = ChangeSet::new();
        changes.credit(&record.recipient, share, ctx);
        changes.credit(&record.sender, record.amount - share, ctx);
        record.status = PaymentStatus::Completed;
        changes.push(Mutation::PutLiquidPayment(record));
        tracing::debug!(
            payment = self.tx.id,
            share,
            elapsed,
            "liquid payment settled"
        );
        Ok(changes)
    }
}

fn elapsed_seconds(from: i64, to: i64) -> Result<i64, TransactionError> {
    let invalid = || TransactionError::Validation(Reason::InvalidTimestamp);
    let from = DateTime::<Utc>::from_timestamp(from, 0).ok_or_else(invalid)?;
    let to = DateTime::<Utc>::from_timestamp(to, 0).ok_or_else(invalid)?;
    Ok((to - from).num_seconds())
}

/// `amount * elapsed / window`, rounded half up and capped at `amount`.
fn recipient_share(amount: i64, complete_minutes: u64, elapsed_seconds: i64) -> i64 {
    let window = i128::from(complete_minutes.max(1)) * 60;
    let elapsed = i128::from(elapsed_seconds.max(0));
    let amount_wide = i128::from(amount);
    let share = (2 * amount_wide * elapsed + window) / (2 * window);
    share.min(amount_wide) as i64
}

impl TransactionAction for LiquidPayment {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, state: &dyn StateView, in_db_transaction: bool) -> Result<(), TransactionError> {
        if self.body.amount <= 0 {
            return Err(TransactionError::Validation(Reason::AmountNotPositive));
        }
        if self.body.complete_minutes == 0 {
            return Err(TransactionError::Validation(Reason::InvalidCompleteMinutes));
        }
        self.recipient()?;
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
        let ctx = ledger_context(&self.tx, block_timestamp, LedgerEvent::LiquidPayment);
        let mut changes = ChangeSet::new();
        changes.debit(&self.tx.sender, self.total()?, ctx);
        changes.push(Mutation::PutLiquidPayment(LiquidPaymentRecord {
            id: self.tx.id,
            sender: self.tx.sender.clone(),
            recipient: self.recipient()?.clone(),
            amount: self.body.amount,
            complete_minutes: self.body.complete_minutes,
            status: PaymentStatus::Pending,
            applied_time: block_timestamp,
            block_height: self.tx.height,
        }));
        Ok(changes)
    }

    fn amount(&self) -> i64 {
        self.body.amount
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        self.deps.fee_model.minimum_fee(&self.tx)
    }

    body_accessors!(LiquidPayment, LiquidPaymentBody);
}
