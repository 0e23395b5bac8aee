//! In-memory ledger backend.
//!
//! Used by tests and by tooling that replays a handful of blocks. A commit
//! first checks every balance delta in the change set for overflow, then
//! applies the mutations in place under the same write lock, so a rejected
//! change set writes nothing.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::changes::{ChangeSet, Mutation};
use super::model::{
    AccountBalance, AccountLedgerEntry, EscrowRecord, EscrowStatus, FeeVoteCommitRecord,
    FeeVoteRevealRecord, LiquidPaymentRecord, NodeRecord, PaymentStatus,
};
use super::view::{LedgerState, StateView, StorageError, StorageResult};
use crate::crypto::keys::NodePublicKey;
use crate::transaction::builder::Transaction;
use crate::transaction::types::{AccountAddress, BlockHash};

#[derive(Debug, Default)]
struct Inner {
    balances: HashMap<AccountAddress, AccountBalance>,
    ledger: Vec<AccountLedgerEntry>,
    /// Registry rows in write order; superseded rows keep `latest = false`.
    nodes: Vec<NodeRecord>,
    payments: BTreeMap<i64, LiquidPaymentRecord>,
    commits: HashMap<(AccountAddress, u32), FeeVoteCommitRecord>,
    reveals: HashMap<(AccountAddress, u32), FeeVoteRevealRecord>,
    escrows: BTreeMap<i64, EscrowRecord>,
    transactions: HashMap<i64, Transaction>,
    block_hashes: BTreeMap<u32, BlockHash>,
}

impl Inner {
    fn balance_mut(&mut self, account: &AccountAddress) -> &mut AccountBalance {
        self.balances
            .entry(account.clone())
            .or_insert_with(|| AccountBalance::empty(account.clone()))
    }

    /// Replay the balance deltas of `changes` on the touched accounts only,
    /// failing on the first overflow.
    fn check(&self, changes: &ChangeSet) -> StorageResult<()> {
        let mut touched: HashMap<&AccountAddress, (i64, i64)> = HashMap::new();
        for mutation in changes.iter() {
            let (account, balance_delta, spendable_delta) = match mutation {
                Mutation::AddSpendable { account, delta } => (account, 0, *delta),
                Mutation::AddBalance { account, delta, .. } => (account, *delta, 0),
                _ => continue,
            };
            let (balance, spendable) = touched.entry(account).or_insert_with(|| {
                self.balances
                    .get(account)
                    .map_or((0, 0), |b| (b.balance, b.spendable_balance))
            });
            let overflow = || StorageError::Overflow(account.clone());
            *balance = balance.checked_add(balance_delta).ok_or_else(overflow)?;
            *spendable = spendable.checked_add(spendable_delta).ok_or_else(overflow)?;
        }
        Ok(())
    }

    /// Apply one mutation. Callers run [`check`](Self::check) first.
    fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::AddSpendable { account, delta } => {
                self.balance_mut(account).spendable_balance += *delta;
            }
            Mutation::AddBalance {
                account,
                delta,
                context,
            } => {
                let entry = self.balance_mut(account);
                entry.balance += *delta;
                entry.block_height = context.block_height;
                self.ledger.push(AccountLedgerEntry {
                    account: account.clone(),
                    change: *delta,
                    transaction_id: context.transaction_id,
                    block_height: context.block_height,
                    timestamp: context.timestamp,
                    event: context.event,
                });
            }
            Mutation::PutNodeRecord(record) => {
                for row in self
                    .nodes
                    .iter_mut()
                    .filter(|row| row.latest && row.node_id == record.node_id)
                {
                    row.latest = false;
                }
                let mut row = record.clone();
                row.latest = true;
                self.nodes.push(row);
            }
            Mutation::PutLiquidPayment(record) => {
                self.payments.insert(record.id, record.clone());
            }
            Mutation::PutFeeVoteCommit(record) => {
                self.commits
                    .insert((record.voter.clone(), record.period_start), record.clone());
            }
            Mutation::PutFeeVoteReveal(record) => {
                self.reveals
                    .insert((record.voter.clone(), record.period_start), record.clone());
            }
            Mutation::PutEscrow(record) => {
                self.escrows.insert(record.id, record.clone());
            }
            Mutation::PutTransaction(tx) => {
                self.transactions.insert(tx.id, tx.clone());
            }
        }
    }
}

/// Ledger kept entirely in memory behind a `parking_lot::RwLock`.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: RwLock<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of account ledger entries recorded so far.
    pub fn ledger_len(&self) -> usize {
        self.inner.read().ledger.len()
    }
}

impl StateView for MemoryLedger {
    fn account_balance(&self, account: &AccountAddress) -> StorageResult<Option<AccountBalance>> {
        Ok(self.inner.read().balances.get(account).cloned())
    }

    fn node_by_account(&self, account: &AccountAddress) -> StorageResult<Option<NodeRecord>> {
        if account.is_sentinel() {
            return Ok(None);
        }
        Ok(self
            .inner
            .read()
            .nodes
            .iter()
            .find(|row| row.latest && &row.account == account)
            .cloned())
    }

    fn node_by_public_key(&self, public_key: &NodePublicKey) -> StorageResult<Option<NodeRecord>> {
        Ok(self
            .inner
            .read()
            .nodes
            .iter()
            .find(|row| row.latest && &row.public_key == public_key)
            .cloned())
    }

    fn liquid_payment(&self, id: i64) -> StorageResult<Option<LiquidPaymentRecord>> {
        Ok(self.inner.read().payments.get(&id).cloned())
    }

    fn pending_liquid_payments(&self) -> StorageResult<Vec<LiquidPaymentRecord>> {
        Ok(self
            .inner
            .read()
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending)
            .cloned()
            .collect())
    }

    fn fee_vote_commit(
        &self,
        voter: &AccountAddress,
        period_start: u32,
    ) -> StorageResult<Option<FeeVoteCommitRecord>> {
        Ok(self
            .inner
            .read()
            .commits
            .get(&(voter.clone(), period_start))
            .cloned())
    }

    fn fee_vote_reveal(
        &self,
        voter: &AccountAddress,
        period_start: u32,
    ) -> StorageResult<Option<FeeVoteRevealRecord>> {
        Ok(self
            .inner
            .read()
            .reveals
            .get(&(voter.clone(), period_start))
            .cloned())
    }

    fn escrow(&self, id: i64) -> StorageResult<Option<EscrowRecord>> {
        Ok(self.inner.read().escrows.get(&id).cloned())
    }

    fn pending_escrows(&self) -> StorageResult<Vec<EscrowRecord>> {
        Ok(self
            .inner
            .read()
            .escrows
            .values()
            .filter(|e| e.status == EscrowStatus::Pending)
            .cloned()
            .collect())
    }

    fn transaction(&self, id: i64) -> StorageResult<Option<Transaction>> {
        Ok(self.inner.read().transactions.get(&id).cloned())
    }

    fn block_hash(&self, height: u32) -> StorageResult<Option<BlockHash>> {
        Ok(self.inner.read().block_hashes.get(&height).copied())
    }
}

impl LedgerState for MemoryLedger {
    fn commit(&self, changes: &ChangeSet) -> StorageResult<()> {
        let mut guard = self.inner.write();
        guard.check(changes)?;
        for mutation in changes.iter() {
            guard.apply(mutation);
        }
        Ok(())
    }

    fn put_block_hash(&self, height: u32, hash: BlockHash) -> StorageResult<()> {
        self.inner.write().block_hashes.insert(height, hash);
        Ok(())
    }

    fn account_ledger(&self, account: &AccountAddress) -> StorageResult<Vec<AccountLedgerEntry>> {
        Ok(self
            .inner
            .read()
            .ledger
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect())
    }

    fn node_history(&self, account: &AccountAddress) -> StorageResult<Vec<NodeRecord>> {
        Ok(self
            .inner
            .read()
            .nodes
            .iter()
            .filter(|row| &row.account == account)
            .cloned()
            .collect())
    }
}
