//! Ledger collaborator interfaces.
//!
//! [`StateView`] is everything a lifecycle step may read. [`LedgerState`]
//! adds the one write primitive, an atomic [`commit`](LedgerState::commit)
//! of a [`ChangeSet`], plus the few writes that happen outside transaction
//! execution (block hashes, genesis balances).

use super::changes::{ChangeSet, LedgerContext};
use super::model::{
    AccountBalance, AccountLedgerEntry, EscrowRecord, FeeVoteCommitRecord, FeeVoteRevealRecord,
    LedgerEvent, LiquidPaymentRecord, NodeRecord,
};
use crate::crypto::keys::NodePublicKey;
use crate::transaction::builder::Transaction;
use crate::transaction::types::{AccountAddress, BlockHash};

/// Errors raised by a ledger backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("balance overflow for account {0}")]
    Overflow(AccountAddress),

    #[error("corrupt record under key {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Read access to ledger state.
///
/// Node lookups only ever see latest rows.
pub trait StateView {
    fn account_balance(&self, account: &AccountAddress) -> StorageResult<Option<AccountBalance>>;

    fn node_by_account(&self, account: &AccountAddress) -> StorageResult<Option<NodeRecord>>;

    fn node_by_public_key(&self, public_key: &NodePublicKey) -> StorageResult<Option<NodeRecord>>;

    fn liquid_payment(&self, id: i64) -> StorageResult<Option<LiquidPaymentRecord>>;

    fn pending_liquid_payments(&self) -> StorageResult<Vec<LiquidPaymentRecord>>;

    fn fee_vote_commit(
        &self,
        voter: &AccountAddress,
        period_start: u32,
    ) -> StorageResult<Option<FeeVoteCommitRecord>>;

    fn fee_vote_reveal(
        &self,
        voter: &AccountAddress,
        period_start: u32,
    ) -> StorageResult<Option<FeeVoteRevealRecord>>;

    fn escrow(&self, id: i64) -> StorageResult<Option<EscrowRecord>>;

    fn pending_escrows(&self) -> StorageResult<Vec<EscrowRecord>>;

    fn transaction(&self, id: i64) -> StorageResult<Option<Transaction>>;

    fn block_hash(&self, height: u32) -> StorageResult<Option<BlockHash>>;
}

/// A ledger backend the processor can commit to.
pub trait LedgerState: StateView + Send + Sync {
    /// Apply every mutation in order, or none of them.
    fn commit(&self, changes: &ChangeSet) -> StorageResult<()>;

    /// Record the hash of an accepted block.
    fn put_block_hash(&self, height: u32, hash: BlockHash) -> StorageResult<()>;

    /// Full account history, oldest first.
    fn account_ledger(&self, account: &AccountAddress) -> StorageResult<Vec<AccountLedgerEntry>>;

    /// Every registry row ever owned by `account`, superseded rows included.
    fn node_history(&self, account: &AccountAddress) -> StorageResult<Vec<NodeRecord>>;

    /// Credit a genesis allocation.
    fn seed_balance(&self, account: &AccountAddress, amount: i64) -> StorageResult<()> {
        let mut changes = ChangeSet::new();
        changes.credit(
            account,
            amount,
            LedgerContext {
                transaction_id: 0,
                block_height: 0,
                timestamp: 0,
                event: LedgerEvent::Genesis,
            },
        );
        self.commit(&changes)
    }
}
