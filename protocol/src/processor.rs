//! # Transaction Processor
//!
//! The processor is the single entry point the rest of the node uses to run
//! a transaction through its lifecycle. It dispatches the transaction to its
//! kind, routes escrowed transactions through the kind's escrow hooks, and
//! commits every change set atomically against the shared ledger.
//!
//! ```text
//! validate ──▶ apply_unconfirmed ──▶ (mempool) ──▶ apply_confirmed
//!                     ▲                    │
//!                     └── undo_apply_unconfirmed (evicted / expired)
//! ```
//!
//! Transactions whose type code has no kind come back as
//! [`Outcome::Unhandled`]; they are not errors.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ledger::{ChangeSet, EscrowStatus, LedgerState, Mutation, PaymentStatus, StateView};
use crate::transaction::escrow::escrow_terms;
use crate::transaction::{
    EscrowApproval, EscrowTypeAction, Reason, Transaction, TransactionAction, TransactionError,
    TypeAction, TypeDispatcher,
};

/// Whether a transaction was handled by one of the known kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unhandled,
}

/// Runs transactions against a [`LedgerState`].
pub struct TransactionProcessor<L: LedgerState> {
    ledger: Arc<L>,
    dispatcher: TypeDispatcher,
}

impl<L: LedgerState> TransactionProcessor<L> {
    pub fn new(ledger: Arc<L>, dispatcher: TypeDispatcher) -> Self {
        Self { ledger, dispatcher }
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    pub fn dispatcher(&self) -> &TypeDispatcher {
        &self.dispatcher
    }

    fn state(&self) -> &dyn StateView {
        &*self.ledger
    }

    /// Check `tx` against current state without changing anything.
    ///
    /// With `in_db_transaction` set, spendable-balance checks are skipped
    /// because the caller already holds the transaction's reservation.
    /// Without it, height 0 is refused: genesis balances are seeded
    /// directly, never admitted.
    pub fn validate(&self, tx: &Transaction, in_db_transaction: bool) -> Result<Outcome, TransactionError> {
        let Some(action) = self.dispatcher.dispatch(tx)? else {
            return Ok(Outcome::Unhandled);
        };
        self.validate_action(&action, in_db_transaction)?;
        Ok(Outcome::Applied)
    }

    fn validate_action(&self, action: &TypeAction, in_db_transaction: bool) -> Result<(), TransactionError> {
        let tx = action.transaction();
        if !in_db_transaction && tx.height == 0 {
            return Err(TransactionError::Validation(
                Reason::GenesisTransactionNotAdmissible,
            ));
        }
        if tx.fee < action.minimum_fee()? {
            return Err(TransactionError::Validation(Reason::FeeBelowMinimum));
        }
        match escrow_hooks(action)? {
            Some(hooks) => hooks.escrow_validate(self.state(), in_db_transaction),
            None => action.validate(self.state(), in_db_transaction),
        }
    }

    /// Reserve the transaction's spend. The caller must have validated it.
    pub fn apply_unconfirmed(&self, tx: &Transaction) -> Result<Outcome, TransactionError> {
        let Some(action) = self.dispatcher.dispatch(tx)? else {
            return Ok(Outcome::Unhandled);
        };
        let changes = match escrow_hooks(&action)? {
            Some(hooks) => hooks.escrow_apply_unconfirmed(self.state())?,
            None => action.apply_unconfirmed(self.state())?,
        };
        self.ledger.commit(&changes)?;
        debug!(tx = tx.id, kind = %action.kind(), "reserved");
        Ok(Outcome::Applied)
    }

    /// Exact inverse of [`apply_unconfirmed`](Self::apply_unconfirmed).
    pub fn undo_apply_unconfirmed(&self, tx: &Transaction) -> Result<Outcome, TransactionError> {
        let Some(action) = self.dispatcher.dispatch(tx)? else {
            return Ok(Outcome::Unhandled);
        };
        let changes = match escrow_hooks(&action)? {
            Some(hooks) => hooks.escrow_undo_apply_unconfirmed(self.state())?,
            None => action.undo_apply_unconfirmed(self.state())?,
        };
        self.ledger.commit(&changes)?;
        debug!(tx = tx.id, kind = %action.kind(), "reservation released");
        Ok(Outcome::Applied)
    }

    /// Apply a transaction included in a block and record it.
    ///
    /// The transaction is revalidated with `in_db_transaction` set, then its
    /// changes and the stored transaction are committed in one batch.
    pub fn apply_confirmed(&self, tx: &Transaction, block_timestamp: i64) -> Result<Outcome, TransactionError> {
        let Some(action) = self.dispatcher.dispatch(tx)? else {
            return Ok(Outcome::Unhandled);
        };
        self.validate_action(&action, true)?;
        let mut changes = match escrow_hooks(&action)? {
            Some(hooks) => hooks.escrow_apply_confirmed(self.state(), block_timestamp)?,
            None => action.apply_confirmed(self.state(), block_timestamp)?,
        };
        changes.push(Mutation::PutTransaction(tx.clone()));
        self.ledger.commit(&changes)?;
        info!(
            tx = tx.id,
            kind = %action.kind(),
            height = tx.height,
            "transaction confirmed"
        );
        Ok(Outcome::Applied)
    }

    /// Whether block assembly should leave `tx` out given what is already
    /// `selected`. Unknown kinds are always left out.
    pub fn skip_mempool_transaction(
        &self,
        tx: &Transaction,
        selected: &[Transaction],
        new_block_timestamp: i64,
        new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        match self.dispatcher.dispatch(tx)? {
            Some(action) => {
                action.skip_mempool_transaction(selected, new_block_timestamp, new_block_height)
            }
            None => Ok(true),
        }
    }

    /// Settle every pending liquid payment whose window has fully elapsed
    /// at the given block. Returns how many were settled.
    pub fn complete_due_liquid_payments(
        &self,
        block_height: u32,
        block_timestamp: i64,
    ) -> Result<usize, TransactionError> {
        let due: Vec<_> = self
            .ledger
            .pending_liquid_payments()?
            .into_iter()
            .filter(|p| p.status == PaymentStatus::Pending)
            .filter(|p| {
                let window = i64::try_from(p.complete_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
                block_timestamp.saturating_sub(p.applied_time) >= window
            })
            .collect();

        let mut changes = ChangeSet::new();
        let mut settled = 0;
        for record in &due {
            match self.settle_payment(record.id, record.applied_time, block_height, block_timestamp) {
                Ok(settlement) => {
                    changes.extend(settlement);
                    settled += 1;
                }
                Err(err @ TransactionError::Storage(_)) => return Err(err),
                Err(err) => {
                    warn!(payment = record.id, code = err.code(), "liquid payment cannot be settled, skipping");
                }
            }
        }
        if !changes.is_empty() {
            self.ledger.commit(&changes)?;
            info!(height = block_height, count = settled, "liquid payments completed");
        }
        Ok(settled)
    }

    fn settle_payment(
        &self,
        payment_id: i64,
        applied_time: i64,
        block_height: u32,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        let original = self
            .ledger
            .transaction(payment_id)?
            .ok_or(TransactionError::NotFound(Reason::OriginalTransactionNotFound))?;
        let Some(TypeAction::LiquidPayment(payment)) = self.dispatcher.dispatch(&original)? else {
            return Err(TransactionError::Validation(
                Reason::OriginalTransactionNotLiquidPayment,
            ));
        };
        payment.complete_payment(self.state(), block_height, block_timestamp, applied_time)
    }

    /// Expire every pending escrow whose timeout is below `block_height`.
    /// Returns how many were expired.
    pub fn expire_escrows(&self, block_height: u32, block_timestamp: i64) -> Result<usize, TransactionError> {
        let expired: Vec<_> = self
            .ledger
            .pending_escrows()?
            .into_iter()
            .filter(|e| e.status == EscrowStatus::Pending && e.timeout < block_height)
            .collect();

        let mut changes = ChangeSet::new();
        for record in &expired {
            let escrowed = self
                .ledger
                .transaction(record.id)?
                .ok_or(TransactionError::NotFound(Reason::EscrowedTransactionNotFound))?;
            let action = self
                .dispatcher
                .dispatch(&escrowed)?
                .ok_or(TransactionError::Validation(Reason::NotEscrowable))?;
            let hooks = action
                .escrowable()
                .ok_or(TransactionError::Validation(Reason::NotEscrowable))?;
            changes.extend(hooks.escrow_approval(
                self.state(),
                EscrowApproval::Expire,
                block_height,
                block_timestamp,
                0,
            )?);
        }
        if !changes.is_empty() {
            self.ledger.commit(&changes)?;
            info!(height = block_height, count = expired.len(), "escrows expired");
        }
        Ok(expired.len())
    }
}

/// Escrow hooks for `action`, if its transaction carries escrow terms.
fn escrow_hooks(action: &TypeAction) -> Result<Option<&dyn EscrowTypeAction>, TransactionError> {
    if escrow_terms(action.transaction()).is_none() {
        return Ok(None);
    }
    match action.escrowable() {
        Some(hooks) => Ok(Some(hooks)),
        None => {
            warn!(tx = action.transaction().id, kind = %action.kind(), "escrow terms on a kind without escrow");
            Err(TransactionError::Validation(Reason::NotEscrowable))
        }
    }
}
