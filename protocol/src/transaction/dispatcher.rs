//! Type dispatcher: wire type code to a wired-up [`TypeAction`].
//!
//! Collaborators are passed in once through [`Dependencies`] and cloned
//! (as `Arc`s) into every action the dispatcher builds. There is no global
//! registry; tests swap a collaborator with one of the `with_*` methods.

use std::fmt;
use std::sync::Arc;

use super::action::TypeAction;
use super::builder::Transaction;
use super::codec::BodyCodec;
use super::error::TransactionError;
use super::fee::{BlockLifetimeFeeModel, ConstantFeeModel, FeeModel};
use super::kinds::{
    approval_escrow::{ApprovalEscrow, ApprovalEscrowBody},
    claim_node_registration::{ClaimNodeRegistration, ClaimNodeRegistrationBody},
    empty::EmptyTransaction,
    fee_vote_commit::{FeeVoteCommit, FeeVoteCommitBody},
    fee_vote_reveal::{FeeVoteReveal, FeeVoteRevealBody},
    liquid_payment::{LiquidPayment, LiquidPaymentBody},
    liquid_payment_stop::{LiquidPaymentStop, LiquidPaymentStopBody},
    node_registration::{NodeRegistration, NodeRegistrationBody},
    remove_node_registration::{RemoveNodeRegistration, RemoveNodeRegistrationBody},
    send_money::{SendMoney, SendMoneyBody},
    update_node_registration::{UpdateNodeRegistration, UpdateNodeRegistrationBody},
};
use super::types::TransactionType;
use crate::auth::{Ed25519Verifier, OwnershipVerifier, PoownVerifier, SignatureVerifier};
use crate::config::EngineConfig;
use crate::governance::{ScheduledVotePhase, VotePhaseScheduler};

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Collaborators shared by every transaction kind.
#[derive(Clone)]
pub struct Dependencies {
    pub fee_model: Arc<dyn FeeModel>,
    pub escrow_fee_model: Arc<dyn FeeModel>,
    pub ownership: Arc<dyn OwnershipVerifier>,
    pub signatures: Arc<dyn SignatureVerifier>,
    pub vote_phase: Arc<dyn VotePhaseScheduler>,
}

impl Dependencies {
    /// Default collaborators configured from `config`. The vote-phase
    /// scheduler starts with no open period.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            fee_model: Arc::new(ConstantFeeModel::new(config.constant_fee)),
            escrow_fee_model: Arc::new(BlockLifetimeFeeModel::new(
                config.escrow_blocks_per_period,
                config.escrow_fee_per_period,
            )),
            ownership: Arc::new(PoownVerifier::new(config.max_poown_age)),
            signatures: Arc::new(Ed25519Verifier),
            vote_phase: Arc::new(ScheduledVotePhase::new(
                config.fee_vote_commit_seconds,
                config.fee_vote_reveal_seconds,
            )),
        }
    }

    pub fn with_fee_model(mut self, model: Arc<dyn FeeModel>) -> Self {
        self.fee_model = model;
        self
    }

    pub fn with_escrow_fee_model(mut self, model: Arc<dyn FeeModel>) -> Self {
        self.escrow_fee_model = model;
        self
    }

    pub fn with_ownership_verifier(mut self, verifier: Arc<dyn OwnershipVerifier>) -> Self {
        self.ownership = verifier;
        self
    }

    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.signatures = verifier;
        self
    }

    pub fn with_vote_phase(mut self, scheduler: Arc<dyn VotePhaseScheduler>) -> Self {
        self.vote_phase = scheduler;
        self
    }
}

impl Default for Dependencies {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// TypeDispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TypeDispatcher {
    deps: Dependencies,
}

impl TypeDispatcher {
    pub fn new(deps: Dependencies) -> Self {
        Self { deps }
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.deps
    }

    /// Build the action for `tx`.
    ///
    /// Returns `Ok(None)` for a type code nobody handles. Body bytes that do
    /// not decode for the kind are an encoding error.
    pub fn dispatch(&self, tx: &Transaction) -> Result<Option<TypeAction>, TransactionError> {
        let Some(kind) = TransactionType::from_type_code(tx.type_code) else {
            return Ok(None);
        };
        let tx = tx.clone();
        let deps = self.deps.clone();
        let action = match kind {
            TransactionType::Empty => {
                EmptyTransaction::check_body(&tx.body_bytes)?;
                TypeAction::Empty(EmptyTransaction::new(tx))
            }
            TransactionType::SendMoney => {
                let body = SendMoneyBody::parse(&tx.body_bytes)?;
                TypeAction::SendMoney(SendMoney::new(tx, body, deps))
            }
            TransactionType::NodeRegistration => {
                let body = NodeRegistrationBody::parse(&tx.body_bytes)?;
                TypeAction::NodeRegistration(NodeRegistration::new(tx, body, deps))
            }
            TransactionType::UpdateNodeRegistration => {
                let body = UpdateNodeRegistrationBody::parse(&tx.body_bytes)?;
                TypeAction::UpdateNodeRegistration(UpdateNodeRegistration::new(tx, body, deps))
            }
            TransactionType::RemoveNodeRegistration => {
                let body = RemoveNodeRegistrationBody::parse(&tx.body_bytes)?;
                TypeAction::RemoveNodeRegistration(RemoveNodeRegistration::new(tx, body, deps))
            }
            TransactionType::ClaimNodeRegistration => {
                let body = ClaimNodeRegistrationBody::parse(&tx.body_bytes)?;
                TypeAction::ClaimNodeRegistration(ClaimNodeRegistration::new(tx, body, deps))
            }
            TransactionType::ApprovalEscrow => {
                let body = ApprovalEscrowBody::parse(&tx.body_bytes)?;
                TypeAction::ApprovalEscrow(ApprovalEscrow::new(tx, body, self.clone()))
            }
            TransactionType::LiquidPayment => {
                let body = LiquidPaymentBody::parse(&tx.body_bytes)?;
                TypeAction::LiquidPayment(LiquidPayment::new(tx, body, deps))
            }
            TransactionType::LiquidPaymentStop => {
                let body = LiquidPaymentStopBody::parse(&tx.body_bytes)?;
                TypeAction::LiquidPaymentStop(LiquidPaymentStop::new(tx, body, self.clone()))
            }
            TransactionType::FeeVoteCommit => {
                let body = FeeVoteCommitBody::parse(&tx.body_bytes)?;
                TypeAction::FeeVoteCommit(FeeVoteCommit::new(tx, body, deps))
            }
            TransactionType::FeeVoteReveal => {
                let body = FeeVoteRevealBody::parse(&tx.body_bytes)?;
                TypeAction::FeeVoteReveal(FeeVoteReveal::new(tx, body, deps))
            }
        };
        Ok(Some(action))
    }
}
