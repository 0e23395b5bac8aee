//! # LedgerDB — sled-backed ledger
//!
//! All ledger data lives in a single sled tree so that a whole
//! [`ChangeSet`] can be committed in one sled transaction. Keys carry a
//! short prefix per record family:
//!
//! | Prefix       | Key suffix                      | Value                         |
//! |--------------|---------------------------------|-------------------------------|
//! | `bal/`       | account bytes                   | `bincode(AccountBalance)`     |
//! | `led/`       | sequence (8B BE)                | `bincode(AccountLedgerEntry)` |
//! | `nodel/`     | node id (8B BE)                 | `bincode(NodeRecord)` latest  |
//! | `nodeh/`     | sequence (8B BE)                | `bincode(NodeRecord)` history |
//! | `nodea/`     | account bytes                   | node id of the owned row      |
//! | `nodek/`     | public key (32B)                | node id of the keyed row      |
//! | `pay/`       | payment id (8B BE)              | `bincode(LiquidPaymentRecord)`|
//! | `fvc/` `fvr/`| account (len-prefixed) + period | vote commit / reveal          |
//! | `esc/`       | escrow id (8B BE)               | `bincode(EscrowRecord)`       |
//! | `tx/`        | transaction id (8B BE)          | `bincode(Transaction)`        |
//! | `blk/`       | height (4B BE)                  | block hash (32B)              |
//! | `meta/`      | counter name                    | u64 BE                        |
//!
//! Heights and sequences are big-endian so sled's lexicographic order is
//! numeric order and prefix scans come back sorted.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, TransactionError as SledTransactionError, TransactionalTree,
};
use sled::{Db, Tree};
use std::path::Path;

use super::changes::{ChangeSet, Mutation};
use super::model::{
    AccountBalance, AccountLedgerEntry, EscrowRecord, EscrowStatus, FeeVoteCommitRecord,
    FeeVoteRevealRecord, LiquidPaymentRecord, NodeRecord, PaymentStatus,
};
use super::view::{LedgerState, StateView, StorageError, StorageResult};
use crate::crypto::keys::NodePublicKey;
use crate::transaction::builder::Transaction;
use crate::transaction::types::{AccountAddress, BlockHash};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const BALANCE: &[u8] = b"bal/";
const LEDGER: &[u8] = b"led/";
const NODE_LATEST: &[u8] = b"nodel/";
const NODE_HISTORY: &[u8] = b"nodeh/";
const NODE_BY_ACCOUNT: &[u8] = b"nodea/";
const NODE_BY_KEY: &[u8] = b"nodek/";
const PAYMENT: &[u8] = b"pay/";
const VOTE_COMMIT: &[u8] = b"fvc/";
const VOTE_REVEAL: &[u8] = b"fvr/";
const ESCROW: &[u8] = b"esc/";
const TRANSACTION: &[u8] = b"tx/";
const BLOCK: &[u8] = b"blk/";

const META_LEDGER_SEQ: &[u8] = b"meta/ledger_seq";
const META_NODE_SEQ: &[u8] = b"meta/node_seq";

fn key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(prefix.len() + suffix.len());
    k.extend_from_slice(prefix);
    k.extend_from_slice(suffix);
    k
}

fn id_key(prefix: &[u8], id: i64) -> Vec<u8> {
    key(prefix, &id.to_be_bytes())
}

fn vote_key(prefix: &[u8], voter: &AccountAddress, period_start: u32) -> Vec<u8> {
    let mut suffix = Vec::with_capacity(8 + voter.len());
    suffix.extend_from_slice(&(voter.len() as u32).to_be_bytes());
    suffix.extend_from_slice(voter.as_bytes());
    suffix.extend_from_slice(&period_start.to_be_bytes());
    key(prefix, &suffix)
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn encode<T: Serialize>(value: &T) -> StorageResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_id(key: &[u8], bytes: &[u8]) -> StorageResult<i64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Corrupt(hex::encode(key)))?;
    Ok(i64::from_be_bytes(arr))
}

type TxResult<T> = Result<T, ConflictableTransactionError<StorageError>>;

fn abort<T>(result: StorageResult<T>) -> TxResult<T> {
    result.map_err(ConflictableTransactionError::Abort)
}

// ---------------------------------------------------------------------------
// LedgerDB
// ---------------------------------------------------------------------------

/// Durable ledger on sled.
///
/// Cheap to clone; clones share the same underlying database.
#[derive(Debug, Clone)]
pub struct LedgerDB {
    db: Db,
    tree: Tree,
}

impl LedgerDB {
    /// Open or create a ledger at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A throwaway ledger that is deleted when dropped.
    pub fn open_temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let tree = db.open_tree("ledger")?;
        Ok(Self { db, tree })
    }

    /// Block until all writes are on disk.
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &[u8]) -> StorageResult<Option<T>> {
        match self.tree.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, prefix: &[u8]) -> StorageResult<Vec<T>> {
        let mut out = Vec::new();
        for item in self.tree.scan_prefix(prefix) {
            let (_key, value) = item?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn node_via_index(&self, index_key: &[u8]) -> StorageResult<Option<NodeRecord>> {
        match self.tree.get(index_key)? {
            Some(id_bytes) => {
                let node_id = decode_id(index_key, &id_bytes)?;
                self.get(&id_key(NODE_LATEST, node_id))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Transactional apply
// ---------------------------------------------------------------------------

fn next_seq(tx: &TransactionalTree, counter: &[u8]) -> TxResult<u64> {
    let current = match tx.get(counter)? {
        Some(bytes) => {
            let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                ConflictableTransactionError::Abort(StorageError::Corrupt(hex::encode(counter)))
            })?;
            u64::from_be_bytes(arr)
        }
        None => 0,
    };
    let next = current + 1;
    tx.insert(counter, next.to_be_bytes().to_vec())?;
    Ok(current)
}

fn load_balance(tx: &TransactionalTree, account: &AccountAddress) -> TxResult<AccountBalance> {
    match tx.get(key(BALANCE, account.as_bytes()))? {
        Some(bytes) => abort(decode(&bytes)),
        None => Ok(AccountBalance::empty(account.clone())),
    }
}

fn store_balance(tx: &TransactionalTree, balance: &AccountBalance) -> TxResult<()> {
    tx.insert(
        key(BALANCE, balance.account.as_bytes()),
        abort(encode(balance))?,
    )?;
    Ok(())
}

fn put_node(tx: &TransactionalTree, record: &NodeRecord) -> TxResult<()> {
    let latest_key = id_key(NODE_LATEST, record.node_id);
    if let Some(bytes) = tx.get(&latest_key)? {
        let mut previous: NodeRecord = abort(decode(&bytes))?;
        if !previous.account.is_sentinel() {
            tx.remove(key(NODE_BY_ACCOUNT, previous.account.as_bytes()))?;
        }
        tx.remove(key(NODE_BY_KEY, previous.public_key.as_bytes()))?;
        previous.latest = false;
        let seq = next_seq(tx, META_NODE_SEQ)?;
        tx.insert(key(NODE_HISTORY, &seq.to_be_bytes()), abort(encode(&previous))?)?;
    }

    let mut row = record.clone();
    row.latest = true;
    let id_bytes = row.node_id.to_be_bytes().to_vec();
    tx.insert(latest_key, abort(encode(&row))?)?;
    if !row.account.is_sentinel() {
        tx.insert(key(NODE_BY_ACCOUNT, row.account.as_bytes()), id_bytes.clone())?;
    }
    tx.insert(key(NODE_BY_KEY, row.public_key.as_bytes()), id_bytes)?;
    Ok(())
}

fn apply_mutation(tx: &TransactionalTree, mutation: &Mutation) -> TxResult<()> {
    match mutation {
        Mutation::AddSpendable { account, delta } => {
            let mut balance = load_balance(tx, account)?;
            balance.spendable_balance = balance.spendable_balance.checked_add(*delta).ok_or(
                ConflictableTransactionError::Abort(StorageError::Overflow(account.clone())),
            )?;
            store_balance(tx, &balance)
        }
        Mutation::AddBalance {
            account,
            delta,
            context,
        } => {
            let mut balance = load_balance(tx, account)?;
            balance.balance = balance.balance.checked_add(*delta).ok_or(
                ConflictableTransactionError::Abort(StorageError::Overflow(account.clone())),
            )?;
            balance.block_height = context.block_height;
            store_balance(tx, &balance)?;

            let entry = AccountLedgerEntry {
                account: account.clone(),
                change: *delta,
                transaction_id: context.transaction_id,
                block_height: context.block_height,
                timestamp: context.timestamp,
                event: context.event,
            };
            let seq = next_seq(tx, META_LEDGER_SEQ)?;
            tx.insert(key(LEDGER, &seq.to_be_bytes()), abort(encode(&entry))?)?;
            Ok(())
        }
        Mutation::PutNodeRecord(record) => put_node(tx, record),
        Mutation::PutLiquidPayment(record) => {
            tx.insert(id_key(PAYMENT, record.id), abort(encode(record))?)?;
            Ok(())
        }
        Mutation::PutFeeVoteCommit(record) => {
            tx.insert(
                vote_key(VOTE_COMMIT, &record.voter, record.period_start),
                abort(encode(record))?,
            )?;
            Ok(())
        }
        Mutation::PutFeeVoteReveal(record) => {
            tx.insert(
                vote_key(VOTE_REVEAL, &record.voter, record.period_start),
                abort(encode(record))?,
            )?;
            Ok(())
        }
        Mutation::PutEscrow(record) => {
            tx.insert(id_key(ESCROW, record.id), abort(encode(record))?)?;
            Ok(())
        }
        Mutation::PutTransaction(transaction) => {
            tx.insert(id_key(TRANSACTION, transaction.id), abort(encode(transaction))?)?;
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Trait impls
// ---------------------------------------------------------------------------

impl StateView for LedgerDB {
    fn account_balance(&self, account: &AccountAddress) -> StorageResult<Option<AccountBalance>> {
        self.get(&key(BALANCE, account.as_bytes()))
    }

    fn node_by_account(&self, account: &AccountAddress) -> StorageResult<Option<NodeRecord>> {
        self.node_via_index(&key(NODE_BY_ACCOUNT, account.as_bytes()))
    }

    fn node_by_public_key(&self, public_key: &NodePublicKey) -> StorageResult<Option<NodeRecord>> {
        self.node_via_index(&key(NODE_BY_KEY, public_key.as_bytes()))
    }

    fn liquid_payment(&self, id: i64) -> StorageResult<Option<LiquidPaymentRecord>> {
        self.get(&id_key(PAYMENT, id))
    }

    fn pending_liquid_payments(&self) -> StorageResult<Vec<LiquidPaymentRecord>> {
        let all: Vec<LiquidPaymentRecord> = self.scan(PAYMENT)?;
        Ok(all
            .into_iter()
            .filter(|p| p.status == PaymentStatus::Pending)
            .collect())
    }

    fn fee_vote_commit(
        &self,
        voter: &AccountAddress,
        period_start: u32,
    ) -> StorageResult<Option<FeeVoteCommitRecord>> {
        self.get(&vote_key(VOTE_COMMIT, voter, period_start))
    }

    fn fee_vote_reveal(
        &self,
        voter: &AccountAddress,
        period_start: u32,
    ) -> StorageResult<Option<FeeVoteRevealRecord>> {
        self.get(&vote_key(VOTE_REVEAL, voter, period_start))
    }

    fn escrow(&self, id: i64) -> StorageResult<Option<EscrowRecord>> {
        self.get(&id_key(ESCROW, id))
    }

    fn pending_escrows(&self) -> StorageResult<Vec<EscrowRecord>> {
        let all: Vec<EscrowRecord> = self.scan(ESCROW)?;
        Ok(all
            .into_iter()
            .filter(|e| e.status == EscrowStatus::Pending)
            .collect())
    }

    fn transaction(&self, id: i64) -> StorageResult<Option<Transaction>> {
        self.get(&id_key(TRANSACTION, id))
    }

    fn block_hash(&self, height: u32) -> StorageResult<Option<BlockHash>> {
        let k = key(BLOCK, &height.to_be_bytes());
        match self.tree.get(&k)? {
            Some(bytes) => {
                let hash: BlockHash = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| StorageError::Corrupt(hex::encode(&k)))?;
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }
}

impl LedgerState for LedgerDB {
    fn commit(&self, changes: &ChangeSet) -> StorageResult<()> {
        let result = self.tree.transaction(|tx| -> TxResult<()> {
            for mutation in changes.iter() {
                apply_mutation(tx, mutation)?;
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(SledTransactionError::Abort(e)) => Err(e),
            Err(SledTransactionError::Storage(e)) => Err(StorageError::Sled(e)),
        }
    }

    fn put_block_hash(&self, height: u32, hash: BlockHash) -> StorageResult<()> {
        self.tree
            .insert(key(BLOCK, &height.to_be_bytes()), hash.to_vec())?;
        Ok(())
    }

    fn account_ledger(&self, account: &AccountAddress) -> StorageResult<Vec<AccountLedgerEntry>> {
        let all: Vec<AccountLedgerEntry> = self.scan(LEDGER)?;
        Ok(all.into_iter().filter(|e| &e.account == account).collect())
    }

    fn node_history(&self, account: &AccountAddress) -> StorageResult<Vec<NodeRecord>> {
        let mut rows: Vec<NodeRecord> = self.scan(NODE_HISTORY)?;
        rows.extend(self.scan::<NodeRecord>(NODE_LATEST)?);
        rows.retain(|row| &row.account == account);
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
