//! Persistent record types.
//!
//! Everything the execution core reads from or writes to the ledger. The
//! records are plain data; all rules live in the transaction kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::keys::{NodePublicKey, Signature};
use crate::transaction::types::{AccountAddress, BlockHash};

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Settled and spendable balance of one account.
///
/// `spendable_balance` is `balance` minus whatever unconfirmed transactions
/// have reserved, so outside an in-flight apply pair it never exceeds
/// `balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: AccountAddress,
    pub balance: i64,
    pub spendable_balance: i64,
    /// Height of the last settled change.
    pub block_height: u32,
}

impl AccountBalance {
    pub fn empty(account: AccountAddress) -> Self {
        Self {
            account,
            balance: 0,
            spendable_balance: 0,
            block_height: 0,
        }
    }
}

/// Why a settled balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerEvent {
    Genesis,
    SendMoney,
    NodeRegistration,
    UpdateNodeRegistration,
    ClaimNodeRegistration,
    RemoveNodeRegistration,
    LiquidPayment,
    LiquidPaymentSettled,
    LiquidPaymentStop,
    FeeVoteCommit,
    FeeVoteReveal,
    EscrowLocked,
    EscrowSettled,
    ApprovalEscrow,
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One line of account history, appended for every settled change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedgerEntry {
    pub account: AccountAddress,
    pub change: i64,
    pub transaction_id: i64,
    pub block_height: u32,
    pub timestamp: i64,
    pub event: LedgerEvent,
}

// ---------------------------------------------------------------------------
// Node Registry
// ---------------------------------------------------------------------------

/// A node registry row.
///
/// Rows are never edited in place: every update writes a new row with the
/// same `node_id` and `latest = true`, and the previous row drops to
/// history. Only latest rows take part in lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: i64,
    pub account: AccountAddress,
    pub public_key: NodePublicKey,
    pub address: String,
    pub locked_balance: i64,
    pub registration_height: u32,
    /// Height of the last change to this row.
    pub height: u32,
    pub queued: bool,
    pub latest: bool,
}

impl NodeRecord {
    /// A released row belongs to the sentinel and can be claimed.
    pub fn is_released(&self) -> bool {
        self.account.is_sentinel()
    }
}

// ---------------------------------------------------------------------------
// Liquid Payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidPaymentRecord {
    /// Id of the LiquidPayment transaction that created this payment.
    pub id: i64,
    pub sender: AccountAddress,
    pub recipient: AccountAddress,
    pub amount: i64,
    pub complete_minutes: u64,
    pub status: PaymentStatus,
    /// Timestamp of the block that first applied the payment.
    pub applied_time: i64,
    pub block_height: u32,
}

// ---------------------------------------------------------------------------
// Fee Votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeVoteCommitRecord {
    pub voter: AccountAddress,
    pub vote_hash: [u8; 32],
    /// First block height of the voting period the commit belongs to.
    pub period_start: u32,
    pub block_height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeVoteRevealRecord {
    pub voter: AccountAddress,
    pub recent_block_hash: BlockHash,
    pub recent_block_height: u32,
    pub fee_vote: i64,
    pub signature: Signature,
    pub period_start: u32,
    pub block_height: u32,
}

// ---------------------------------------------------------------------------
// Escrow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Funds parked by an escrowed transaction until its approver decides or
/// its timeout passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Id of the escrowed transaction.
    pub id: i64,
    pub sender: AccountAddress,
    pub recipient: AccountAddress,
    pub approver: AccountAddress,
    pub amount: i64,
    pub commission: i64,
    /// Last block height at which the approver may still decide.
    pub timeout: u32,
    pub status: EscrowStatus,
    pub block_height: u32,
    pub instruction: String,
}
