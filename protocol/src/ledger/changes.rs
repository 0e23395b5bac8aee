//! Mutation commands returned by lifecycle steps.
//!
//! Transaction kinds never write to the ledger. They read through a
//! [`StateView`](super::StateView) and return a [`ChangeSet`]; the caller
//! hands the whole set to [`LedgerState::commit`](super::LedgerState::commit),
//! which applies it all or not at all.

use super::model::{
    EscrowRecord, FeeVoteCommitRecord, FeeVoteRevealRecord, LedgerEvent, LiquidPaymentRecord,
    NodeRecord,
};
use crate::transaction::builder::Transaction;
use crate::transaction::types::AccountAddress;

/// Context recorded in the account ledger for a settled change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerContext {
    pub transaction_id: i64,
    pub block_height: u32,
    pub timestamp: i64,
    pub event: LedgerEvent,
}

/// A single ledger write.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Adjust spendable balance only. Reservations are negative deltas.
    AddSpendable { account: AccountAddress, delta: i64 },

    /// Adjust settled balance and append an account ledger entry.
    AddBalance {
        account: AccountAddress,
        delta: i64,
        context: LedgerContext,
    },

    /// Write a new latest registry row, superseding the current latest row
    /// with the same `node_id`.
    PutNodeRecord(NodeRecord),

    PutLiquidPayment(LiquidPaymentRecord),
    PutFeeVoteCommit(FeeVoteCommitRecord),
    PutFeeVoteReveal(FeeVoteRevealRecord),
    PutEscrow(EscrowRecord),

    /// Persist a confirmed transaction so later kinds can re-materialize it.
    PutTransaction(Transaction),
}

/// Ordered list of mutations produced by one lifecycle step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn extend(&mut self, other: ChangeSet) {
        self.mutations.extend(other.mutations);
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutation> {
        self.mutations.iter()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }

    // -- Balance shorthands -------------------------------------------------

    /// Reserve `amount` out of spendable balance.
    pub fn reserve(&mut self, account: &AccountAddress, amount: i64) {
        self.add_spendable(account, -amount);
    }

    /// Return a reservation made by [`ChangeSet::reserve`].
    pub fn release(&mut self, account: &AccountAddress, amount: i64) {
        self.add_spendable(account, amount);
    }

    /// Settle an outgoing amount. Spendable balance was already reduced
    /// when the transaction was reserved.
    pub fn debit(&mut self, account: &AccountAddress, amount: i64, context: LedgerContext) {
        self.add_balance(account, -amount, context);
    }

    /// Settle an incoming amount; it becomes spendable immediately.
    pub fn credit(&mut self, account: &AccountAddress, amount: i64, context: LedgerContext) {
        self.add_balance(account, amount, context);
        self.add_spendable(account, amount);
    }

    /// Independent settled and spendable adjustments.
    pub fn adjust(
        &mut self,
        account: &AccountAddress,
        balance_delta: i64,
        spendable_delta: i64,
        context: LedgerContext,
    ) {
        self.add_balance(account, balance_delta, context);
        self.add_spendable(account, spendable_delta);
    }

    fn add_spendable(&mut self, account: &AccountAddress, delta: i64) {
        if delta != 0 {
            self.push(Mutation::AddSpendable {
                account: account.clone(),
                delta,
            });
        }
    }

    fn add_balance(&mut self, account: &AccountAddress, delta: i64, context: LedgerContext) {
        if delta != 0 {
            self.push(Mutation::AddBalance {
                account: account.clone(),
                delta,
                context,
            });
        }
    }
}

impl From<Vec<Mutation>> for ChangeSet {
    fn from(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }
}

impl IntoIterator for ChangeSet {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}
