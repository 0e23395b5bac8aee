//! The lifecycle contract and the closed set of kinds implementing it.
//!
//! ```text
//!  mempool admission     validate(false) ─▶ apply_unconfirmed
//!  dropped from pool     undo_apply_unconfirmed
//!  block assembly        skip_mempool_transaction
//!  block confirmation    validate(true)  ─▶ apply_confirmed
//! ```
//!
//! State-affecting steps read through a [`StateView`] and return the
//! mutations they want as a [`ChangeSet`]. Nothing here writes.

use super::body::TransactionBody;
use super::builder::Transaction;
use super::error::TransactionError;
use super::escrow::EscrowTypeAction;
use super::kinds::{
    approval_escrow::ApprovalEscrow, claim_node_registration::ClaimNodeRegistration,
    empty::EmptyTransaction, fee_vote_commit::FeeVoteCommit, fee_vote_reveal::FeeVoteReveal,
    liquid_payment::LiquidPayment, liquid_payment_stop::LiquidPaymentStop,
    node_registration::NodeRegistration, remove_node_registration::RemoveNodeRegistration,
    send_money::SendMoney, update_node_registration::UpdateNodeRegistration,
};
use super::types::TransactionType;
use crate::ledger::{ChangeSet, StateView};

/// Lifecycle every transaction kind honors.
pub trait TransactionAction {
    fn transaction(&self) -> &Transaction;

    /// Check the transaction against current state without changing it.
    ///
    /// `in_db_transaction` is true on the block-confirmation path, where the
    /// transaction's own reservation is already reflected in spendable
    /// balance.
    fn validate(&self, state: &dyn StateView, in_db_transaction: bool)
        -> Result<(), TransactionError>;

    /// Tentative, reversible effect: reserve what the transaction spends.
    /// Requires a passing `validate` first.
    fn apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError>;

    /// Exact inverse of `apply_unconfirmed`.
    fn undo_apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError>;

    /// Final effect, committed atomically by the caller.
    fn apply_confirmed(
        &self,
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError>;

    /// Principal value moved. Zero for kinds that move none.
    fn amount(&self) -> i64 {
        0
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError>;

    /// Encoded body size; always `body_bytes().len()`.
    fn size(&self) -> u32;

    fn parse_body_bytes(&self, bytes: &[u8]) -> Result<TransactionBody, TransactionError>;

    fn body_bytes(&self) -> Vec<u8>;

    /// Put the typed body into the envelope's body slot.
    fn transaction_body(&self, tx: &mut Transaction);

    /// Whether block assembly should leave this transaction out, given what
    /// it already selected for the block at `new_block_height`.
    fn skip_mempool_transaction(
        &self,
        _selected: &[Transaction],
        _new_block_timestamp: i64,
        _new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        Ok(false)
    }

    /// Escrow hooks, when this transaction is escrowed and its kind
    /// supports it.
    fn escrowable(&self) -> Option<&dyn EscrowTypeAction> {
        None
    }
}

/// A dispatched, dependency-wired transaction.
#[derive(Debug, Clone)]
pub enum TypeAction {
    Empty(EmptyTransaction),
    SendMoney(SendMoney),
    NodeRegistration(NodeRegistration),
    UpdateNodeRegistration(UpdateNodeRegistration),
    RemoveNodeRegistration(RemoveNodeRegistration),
    ClaimNodeRegistration(ClaimNodeRegistration),
    ApprovalEscrow(ApprovalEscrow),
    LiquidPayment(LiquidPayment),
    LiquidPaymentStop(LiquidPaymentStop),
    FeeVoteCommit(FeeVoteCommit),
    FeeVoteReveal(FeeVoteReveal),
}

macro_rules! each_kind {
    ($self:expr, $action:ident => $body:expr) => {
        match $self {
            TypeAction::Empty($action) => $body,
            TypeAction::SendMoney($action) => $body,
            TypeAction::NodeRegistration($action) => $body,
            TypeAction::UpdateNodeRegistration($action) => $body,
            TypeAction::RemoveNodeRegistration($action) => $body,
            TypeAction::ClaimNodeRegistration($action) => $body,
            TypeAction::ApprovalEscrow($action) => $body,
            TypeAction::LiquidPayment($action) => $body,
            TypeAction::LiquidPaymentStop($action) => $body,
            TypeAction::FeeVoteCommit($action) => $body,
            TypeAction::FeeVoteReveal($action) => $body,
        }
    };
}

impl TypeAction {
    pub fn kind(&self) -> TransactionType {
        match self {
            Self::Empty(_) => TransactionType::Empty,
            Self::SendMoney(_) => TransactionType::SendMoney,
            Self::NodeRegistration(_) => TransactionType::NodeRegistration,
            Self::UpdateNodeRegistration(_) => TransactionType::UpdateNodeRegistration,
            Self::RemoveNodeRegistration(_) => TransactionType::RemoveNodeRegistration,
            Self::ClaimNodeRegistration(_) => TransactionType::ClaimNodeRegistration,
            Self::ApprovalEscrow(_) => TransactionType::ApprovalEscrow,
            Self::LiquidPayment(_) => TransactionType::LiquidPayment,
            Self::LiquidPaymentStop(_) => TransactionType::LiquidPaymentStop,
            Self::FeeVoteCommit(_) => TransactionType::FeeVoteCommit,
            Self::FeeVoteReveal(_) => TransactionType::FeeVoteReveal,
        }
    }
}

impl TransactionAction for TypeAction {
    fn transaction(&self) -> &Transaction {
        each_kind!(self, a => a.transaction())
    }

    fn validate(
        &self,
        state: &dyn StateView,
        in_db_transaction: bool,
    ) -> Result<(), TransactionError> {
        each_kind!(self, a => a.validate(state, in_db_transaction))
    }

    fn apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        each_kind!(self, a => a.apply_unconfirmed(state))
    }

    fn undo_apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        each_kind!(self, a => a.undo_apply_unconfirmed(state))
    }

    fn apply_confirmed(
        &self,
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        each_kind!(self, a => a.apply_confirmed(state, block_timestamp))
    }

    fn amount(&self) -> i64 {
        each_kind!(self, a => a.amount())
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        each_kind!(self, a => a.minimum_fee())
    }

    fn size(&self) -> u32 {
        each_kind!(self, a => a.size())
    }

    fn parse_body_bytes(&self, bytes: &[u8]) -> Result<TransactionBody, TransactionError> {
        each_kind!(self, a => a.parse_body_bytes(bytes))
    }

    fn body_bytes(&self) -> Vec<u8> {
        each_kind!(self, a => a.body_bytes())
    }

    fn transaction_body(&self, tx: &mut Transaction) {
        each_kind!(self, a => a.transaction_body(tx))
    }

    fn skip_mempool_transaction(
        &self,
        selected: &[Transaction],
        new_block_timestamp: i64,
        new_block_height: u32,
    ) -> Result<bool, TransactionError> {
        each_kind!(self, a => a.skip_mempool_transaction(selected, new_block_timestamp, new_block_height))
    }

    fn escrowable(&self) -> Option<&dyn EscrowTypeAction> {
        each_kind!(self, a => a.escrowable())
    }
}
