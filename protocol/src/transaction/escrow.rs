//! Escrowed execution.
//!
//! A transaction whose envelope carries [`EscrowTerms`] does not settle
//! directly: its funds (amount plus the approver's commission) are parked
//! in an escrow record until the approver approves or rejects it with an
//! ApprovalEscrow transaction, or the timeout height passes.
//!
//! Only kinds that implement [`EscrowTypeAction`] can be escrowed; the
//! capability is exposed through
//! [`TransactionAction::escrowable`](super::action::TransactionAction::escrowable).

use serde::{Deserialize, Serialize};

use super::builder::Transaction;
use super::codec::CodecError;
use super::error::{Reason, TransactionError};
use super::types::AccountAddress;
use crate::ledger::{ChangeSet, StateView};

/// Escrow terms attached to a transaction envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowTerms {
    pub approver: AccountAddress,
    /// Paid to the approver when they decide.
    pub commission: i64,
    /// Last height at which the approver may decide.
    pub timeout: u32,
    #[serde(default)]
    pub instruction: String,
}

/// Outcome applied to a pending escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowApproval {
    Approve,
    Reject,
    /// Timeout reached. Never valid on the wire.
    Expire,
}

impl EscrowApproval {
    pub const fn wire_code(self) -> u32 {
        match self {
            Self::Approve => 0,
            Self::Reject => 1,
            Self::Expire => 2,
        }
    }

    /// Decode an approver's decision. Expiry is not something an approver
    /// can submit.
    pub fn from_wire(code: u32) -> Result<Self, CodecError> {
        match code {
            0 => Ok(Self::Approve),
            1 => Ok(Self::Reject),
            other => Err(CodecError::InvalidValue {
                field: "approval",
                detail: format!("unknown approval code {}", other),
            }),
        }
    }
}

/// Lifecycle hooks used instead of the plain ones when a transaction is
/// escrowed.
pub trait EscrowTypeAction {
    fn escrow_validate(
        &self,
        state: &dyn StateView,
        in_db_transaction: bool,
    ) -> Result<(), TransactionError>;

    fn escrow_apply_unconfirmed(&self, state: &dyn StateView) -> Result<ChangeSet, TransactionError>;

    fn escrow_undo_apply_unconfirmed(
        &self,
        state: &dyn StateView,
    ) -> Result<ChangeSet, TransactionError>;

    fn escrow_apply_confirmed(
        &self,
        state: &dyn StateView,
        block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError>;

    /// Settle the parked funds according to `approval`.
    fn escrow_approval(
        &self,
        state: &dyn StateView,
        approval: EscrowApproval,
        block_height: u32,
        block_timestamp: i64,
        approval_transaction_id: i64,
    ) -> Result<ChangeSet, TransactionError>;
}

/// Terms of an escrowed transaction, if it has usable ones.
pub(crate) fn escrow_terms(tx: &Transaction) -> Option<&EscrowTerms> {
    tx.escrow.as_ref().filter(|terms| !terms.approver.is_empty())
}

/// Structural checks on escrow terms.
pub(crate) fn validate_terms(tx: &Transaction) -> Result<&EscrowTerms, TransactionError> {
    let terms = escrow_terms(tx).ok_or(TransactionError::Validation(Reason::InvalidEscrowTerms))?;
    if terms.commission < 0 || terms.timeout <= tx.height || terms.approver == tx.sender {
        return Err(TransactionError::Validation(Reason::InvalidEscrowTerms));
    }
    Ok(terms)
}
