//! Error taxonomy for the transaction lifecycle.
//!
//! Callers branch on [`ErrorKind`], clients display [`Reason::message`],
//! and logs carry the stable [`Reason::code`]. Nobody matches on strings.

use std::fmt;

use super::codec::CodecError;
use crate::ledger::StorageError;

macro_rules! reasons {
    ($($variant:ident => $message:literal,)+) => {
        /// Machine-readable cause attached to validation, authorization and
        /// not-found errors. The code is the variant name and never changes
        /// once released.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Reason {
            $($variant,)+
        }

        impl Reason {
            pub const fn code(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }

            pub const fn message(self) -> &'static str {
                match self {
                    $(Self::$variant => $message,)+
                }
            }
        }
    };
}

reasons! {
    // Envelope and balances
    AmountNotPositive => "transaction must have an amount more than 0",
    MissingSender => "transaction must have a sender address",
    MissingRecipient => "transaction must have a recipient address",
    InsufficientSpendableBalance => "spendable balance is not enough to cover this transaction",
    FeeBelowMinimum => "transaction fee is below the minimum fee",
    AmountOverflow => "transaction amounts overflow",
    InvalidTimestamp => "timestamp is out of range",
    GenesisTransactionNotAdmissible => "transactions at height 0 are only accepted from genesis",

    // Node registry
    NegativeLockedBalance => "locked balance must not be negative",
    AccountAlreadyNodeOwner => "account already owns a node",
    NodePublicKeyAlreadyRegistered => "node public key is already registered",
    NodeNotFoundWithAccountAddress => "no node is registered with this account address",
    NodeNotFoundWithPublicKey => "no node is registered with this public key",
    LockedBalanceLessThenPreviouslyLocked => "locked balance is less than the previously locked balance",
    InvalidNodeAddress => "node address is not a valid URI or IP address",
    SenderNotNodeOwner => "sender does not own this node",
    PoownAccountMismatch => "proof of ownership was issued for another account",
    PoownBlockMismatch => "proof of ownership references an unknown block",
    PoownBlockOutOfRange => "proof of ownership references a block that is too old or in the future",
    InvalidPoownSignature => "proof of ownership signature is invalid",

    // Liquid payments
    InvalidCompleteMinutes => "complete minutes must be more than 0",
    PaymentTimestampBeforeApplied => "block timestamp is before the payment was first applied",
    LiquidPaymentNotFound => "liquid payment not found",
    LiquidPaymentAlreadyCompleted => "liquid payment is already completed",
    LiquidPaymentStopperNotParticipant => "only the sender or recipient can stop a liquid payment",
    OriginalTransactionNotFound => "original liquid payment transaction not found",
    OriginalTransactionNotLiquidPayment => "referenced transaction is not a liquid payment",

    // Fee votes
    SenderAccountNotNodeOwner => "sender account does not own a node",
    InvalidFeeVote => "fee vote must not be negative",
    DuplicatedFeeVoteCommit => "a fee vote commit was already submitted this period",
    DuplicatedFeeVoteReveal => "a fee vote reveal was already submitted this period",
    InvalidFeeVotePhase => "fee vote submitted outside its phase",
    InvalidRecentBlock => "fee vote references an invalid recent block",
    FeeVoteCommitNotFound => "no fee vote commit found for this period",
    FeeVoteHashMismatch => "revealed fee vote does not match the committed hash",
    InvalidVoterSignature => "fee vote signature is invalid",

    // Escrow
    InvalidEscrowTerms => "escrow terms are invalid",
    EscrowNotFound => "escrow not found",
    EscrowNotPending => "escrow is no longer pending",
    EscrowApprovalTimedOut => "escrow timeout height has passed",
    SenderNotEscrowApprover => "sender is not the escrow approver",
    NotEscrowable => "transaction kind does not support escrow",
    EscrowedTransactionNotFound => "escrowed transaction not found",
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Coarse error category callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Storage,
    Encoding,
}

/// Everything a lifecycle step can fail with.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// Business-rule violation. Always recoverable; nothing was written.
    #[error("{0}")]
    Validation(Reason),

    /// The sender has no rights over the target resource.
    #[error("{0}")]
    Authorization(Reason),

    /// A referenced node, payment, vote or escrow does not exist.
    #[error("{0}")]
    NotFound(Reason),

    /// The ledger failed. Propagated as-is, never retried here.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Body bytes could not be decoded.
    #[error(transparent)]
    Encoding(#[from] CodecError),
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Encoding(_) => ErrorKind::Encoding,
        }
    }

    pub fn reason(&self) -> Option<Reason> {
        match self {
            Self::Validation(r) | Self::Authorization(r) | Self::NotFound(r) => Some(*r),
            Self::Storage(_) | Self::Encoding(_) => None,
        }
    }

    /// Stable code for logs and clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(r) | Self::Authorization(r) | Self::NotFound(r) => r.code(),
            Self::Storage(_) => "StorageError",
            Self::Encoding(_) => "EncodingError",
        }
    }
}
