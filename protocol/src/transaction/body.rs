//! Typed body slot of the transaction envelope.

use serde::{Deserialize, Serialize};

use super::codec::{BodyCodec, CodecError};
use super::kinds::{
    approval_escrow::ApprovalEscrowBody, claim_node_registration::ClaimNodeRegistrationBody,
    empty::EmptyTransaction, fee_vote_commit::FeeVoteCommitBody,
    fee_vote_reveal::FeeVoteRevealBody, liquid_payment::LiquidPaymentBody,
    liquid_payment_stop::LiquidPaymentStopBody, node_registration::NodeRegistrationBody,
    remove_node_registration::RemoveNodeRegistrationBody, send_money::SendMoneyBody,
    update_node_registration::UpdateNodeRegistrationBody,
};
use super::types::TransactionType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBody {
    #[default]
    Empty,
    SendMoney(SendMoneyBody),
    NodeRegistration(NodeRegistrationBody),
    UpdateNodeRegistration(UpdateNodeRegistrationBody),
    RemoveNodeRegistration(RemoveNodeRegistrationBody),
    ClaimNodeRegistration(ClaimNodeRegistrationBody),
    ApprovalEscrow(ApprovalEscrowBody),
    LiquidPayment(LiquidPaymentBody),
    LiquidPaymentStop(LiquidPaymentStopBody),
    FeeVoteCommit(FeeVoteCommitBody),
    FeeVoteReveal(FeeVoteRevealBody),
}

macro_rules! each_body {
    ($self:expr, $body:ident => $e:expr, empty => $empty:expr) => {
        match $self {
            TransactionBody::Empty => $empty,
            TransactionBody::SendMoney($body) => $e,
            TransactionBody::NodeRegistration($body) => $e,
            TransactionBody::UpdateNodeRegistration($body) => $e,
            TransactionBody::RemoveNodeRegistration($body) => $e,
            TransactionBody::ClaimNodeRegistration($body) => $e,
            TransactionBody::ApprovalEscrow($body) => $e,
            TransactionBody::LiquidPayment($body) => $e,
            TransactionBody::LiquidPaymentStop($body) => $e,
            TransactionBody::FeeVoteCommit($body) => $e,
            TransactionBody::FeeVoteReveal($body) => $e,
        }
    };
}

impl TransactionBody {
    pub fn kind(&self) -> TransactionType {
        match self {
            Self::Empty => TransactionType::Empty,
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

    pub fn size(&self) -> u32 {
        each_body!(self, b => b.size(), empty => 0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        each_body!(self, b => b.to_bytes(), empty => Vec::new())
    }

    /// Decode body bytes as the body of `kind`.
    pub fn parse(kind: TransactionType, bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(match kind {
            TransactionType::Empty => {
                EmptyTransaction::check_body(bytes)?;
                Self::Empty
            }
            TransactionType::SendMoney => Self::SendMoney(SendMoneyBody::parse(bytes)?),
            TransactionType::NodeRegistration => {
                Self::NodeRegistration(NodeRegistrationBody::parse(bytes)?)
            }
            TransactionType::UpdateNodeRegistration => {
                Self::UpdateNodeRegistration(UpdateNodeRegistrationBody::parse(bytes)?)
            }
            TransactionType::RemoveNodeRegistration => {
                Self::RemoveNodeRegistration(RemoveNodeRegistrationBody::parse(bytes)?)
            }
            TransactionType::ClaimNodeRegistration => {
                Self::ClaimNodeRegistration(ClaimNodeRegistrationBody::parse(bytes)?)
            }
            TransactionType::ApprovalEscrow => Self::ApprovalEscrow(ApprovalEscrowBody::parse(bytes)?),
            TransactionType::LiquidPayment => Self::LiquidPayment(LiquidPaymentBody::parse(bytes)?),
            TransactionType::LiquidPaymentStop => {
                Self::LiquidPaymentStop(LiquidPaymentStopBody::parse(bytes)?)
            }
            TransactionType::FeeVoteCommit => Self::FeeVoteCommit(FeeVoteCommitBody::parse(bytes)?),
            TransactionType::FeeVoteReveal => Self::FeeVoteReveal(FeeVoteRevealBody::parse(bytes)?),
        })
    }
}

macro_rules! body_from {
    ($($body:ty => $variant:ident,)+) => {
        $(
            impl From<$body> for TransactionBody {
                fn from(body: $body) -> Self {
                    Self::$variant(body)
                }
            }
        )+
    };
}

body_from! {
    SendMoneyBody => SendMoney,
    NodeRegistrationBody => NodeRegistration,
    UpdateNodeRegistrationBody => UpdateNodeRegistration,
    RemoveNodeRegistrationBody => RemoveNodeRegistration,
    ClaimNodeRegistrationBody => ClaimNodeRegistration,
    ApprovalEscrowBody => ApprovalEscrow,
    LiquidPaymentBody => LiquidPayment,
    LiquidPaymentStopBody => LiquidPaymentStop,
    FeeVoteCommitBody => FeeVoteCommit,
    FeeVoteRevealBody => FeeVoteReveal,
}
