//! Shared setup for the kind tests.

use crate::auth::ProofOfOwnership;
use crate::crypto::keys::NodeKeypair;
use crate::ledger::{ChangeSet, LedgerState, MemoryLedger, Mutation, NodeRecord, StateView};
use crate::transaction::action::TypeAction;
use crate::transaction::builder::Transaction;
use crate::transaction::dispatcher::TypeDispatcher;
use crate::transaction::types::{AccountAddress, BlockHash};

pub const HEIGHT: u32 = 10;

pub fn block_hash(height: u32) -> BlockHash {
    crate::crypto::hash::sha256_array(&height.to_le_bytes())
}

/// In-memory ledger with the given balances and block hashes up to
/// [`HEIGHT`].
pub fn ledger(balances: &[(&str, i64)]) -> MemoryLedger {
    let ledger = MemoryLedger::new();
    for (account, amount) in balances {
        ledger
            .seed_balance(&AccountAddress::from(*account), *amount)
            .unwrap();
    }
    for height in 0..=HEIGHT {
        ledger.put_block_hash(height, block_hash(height)).unwrap();
    }
    ledger
}

pub fn keypair(seed: u8) -> NodeKeypair {
    NodeKeypair::from_seed(&[seed; 32])
}

pub fn poown(keypair: &NodeKeypair, account: &str) -> ProofOfOwnership {
    let height = HEIGHT - 1;
    ProofOfOwnership::sign(keypair, AccountAddress::from(account), block_hash(height), height)
}

/// Write a latest registry row for `account` directly.
pub fn register_node(ledger: &MemoryLedger, node_id: i64, account: &str, keypair: &NodeKeypair, locked: i64) {
    let mut changes = ChangeSet::new();
    changes.push(Mutation::PutNodeRecord(NodeRecord {
        node_id,
        account: AccountAddress::from(account),
        public_key: keypair.public_key(),
        address: "127.0.0.1:7000".into(),
        locked_balance: locked,
        registration_height: 1,
        height: 1,
        queued: false,
        latest: true,
    }));
    ledger.commit(&changes).unwrap();
}

pub fn dispatch(tx: &Transaction) -> TypeAction {
    TypeDispatcher::default().dispatch(tx).unwrap().unwrap()
}

/// `(balance, spendable)` of `account`.
pub fn balances(state: &dyn StateView, account: &str) -> (i64, i64) {
    state
        .account_balance(&AccountAddress::from(account))
        .unwrap()
        .map_or((0, 0), |b| (b.balance, b.spendable_balance))
}
