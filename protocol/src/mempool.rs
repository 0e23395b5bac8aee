//! Priority-ordered pool of unconfirmed transactions.
//!
//! Admission runs a transaction through the processor's `validate` and
//! `apply_unconfirmed`, so everything in the pool already holds its
//! spendable-balance reservation. Leaving the pool any way other than block
//! inclusion (removal, eviction, expiry) undoes that reservation.
//!
//! ## Design
//!
//! - `DashMap` indexes entries by transaction id for lookups and duplicate
//!   detection.
//! - `parking_lot::RwLock<BTreeMap>` keeps the fee index, highest fee per
//!   byte first, for block assembly and eviction.
//! - A single admission lock serialises validate + reserve so two
//!   transactions from one sender cannot both pass against the same
//!   spendable balance.
//! - Node-registry changes hold a claim on every account and node key they
//!   touch until they leave the pool. Their reservation is priced against
//!   the current registry row, so that row must not move underneath them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::crypto::keys::NodePublicKey;
use crate::ledger::LedgerState;
use crate::processor::{Outcome, TransactionProcessor};
use crate::transaction::{AccountAddress, Transaction, TransactionBody, TransactionError, TypeCode};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of transactions the pool will hold.
    pub max_size: usize,

    /// Maximum pending transactions per sender.
    pub max_per_sender: usize,

    /// Seconds after which a pending transaction is dropped by
    /// [`Mempool::expire_old`].
    pub expiry_seconds: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for MempoolConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_size: config.mempool_max_size,
            max_per_sender: config.mempool_max_per_sender,
            expiry_seconds: config.mempool_expiry_seconds,
        }
    }
}

// ---------------------------------------------------------------------------
// FeeKey
// ---------------------------------------------------------------------------

/// Fee index key: fee per byte descending, then oldest first, then id.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FeeKey {
    /// `u64::MAX - fee_per_byte`, so ascending order is highest fee first.
    inverted_fee: u64,
    added_at: u64,
    tx_id: i64,
}

impl FeeKey {
    fn of(entry: &MempoolEntry) -> Self {
        Self {
            inverted_fee: u64::MAX - entry.fee_per_byte,
            added_at: entry.added_at,
            tx_id: entry.transaction.id,
        }
    }
}

impl Ord for FeeKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inverted_fee
            .cmp(&other.inverted_fee)
            .then_with(|| self.added_at.cmp(&other.added_at))
            .then_with(|| self.tx_id.cmp(&other.tx_id))
    }
}

impl PartialOrd for FeeKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// RegistryKey
// ---------------------------------------------------------------------------

/// Registry state a pending node-registry change depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RegistryKey {
    Account(AccountAddress),
    Node(NodePublicKey),
}

impl RegistryKey {
    /// Keys touched by `tx`; empty for kinds outside the node registry.
    fn of(tx: &Transaction) -> Vec<Self> {
        let mut keys = Vec::new();
        let mut node = |key: &NodePublicKey| {
            if !key.is_zero() {
                keys.push(Self::Node(*key));
            }
        };
        let owner = match &tx.body {
            TransactionBody::NodeRegistration(body) => {
                node(&body.node_public_key);
                Some(body.account.clone())
            }
            TransactionBody::UpdateNodeRegistration(body) => {
                node(&body.node_public_key);
                None
            }
            TransactionBody::RemoveNodeRegistration(body) => {
                node(&body.node_public_key);
                None
            }
            TransactionBody::ClaimNodeRegistration(body) => {
                node(&body.node_public_key);
                Some(body.account.clone())
            }
            _ => return keys,
        };
        keys.push(Self::Account(tx.sender.clone()));
        if let Some(owner) = owner.filter(|o| o != &tx.sender) {
            keys.push(Self::Account(owner));
        }
        keys
    }
}

// ---------------------------------------------------------------------------
// MempoolEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub transaction: Transaction,

    /// Unix timestamp (seconds) of admission.
    pub added_at: u64,

    pub fee_per_byte: u64,
}

// ---------------------------------------------------------------------------
// MempoolError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum MempoolError {
    /// A transaction with the same id is already pending.
    DuplicateTransaction,

    /// The sender already has too many pending transactions.
    SenderLimitExceeded { sender: AccountAddress, limit: usize },

    /// The pool is full and the incoming transaction does not outbid the
    /// lowest-fee entry.
    MempoolFull { size: usize },

    /// No transaction kind handles this type code.
    UnknownType(TypeCode),

    /// Another pending node-registry change touches the same account or
    /// node key.
    RegistryChangePending { pending: i64 },

    /// The transaction failed validation or could not be reserved.
    Rejected(TransactionError),
}

impl fmt::Display for MempoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTransaction => write!(f, "transaction already exists in mempool"),
            Self::SenderLimitExceeded { sender, limit } => {
                write!(f, "sender {} exceeded per-sender limit of {}", sender, limit)
            }
            Self::MempoolFull { size } => {
                write!(f, "mempool is full ({} transactions)", size)
            }
            Self::UnknownType(code) => write!(f, "no handler for transaction type {}", code),
            Self::RegistryChangePending { pending } => {
                write!(f, "pending registry change {} touches the same node or account", pending)
            }
            Self::Rejected(err) => write!(f, "transaction rejected: {}", err),
        }
    }
}

impl std::error::Error for MempoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TransactionError> for MempoolError {
    fn from(err: TransactionError) -> Self {
        Self::Rejected(err)
    }
}

// ---------------------------------------------------------------------------
// Mempool
// ---------------------------------------------------------------------------

pub struct Mempool<L: LedgerState> {
    processor: Arc<TransactionProcessor<L>>,

    transactions: DashMap<i64, MempoolEntry>,

    /// Pending ids ordered by fee density, highest first.
    fee_index: RwLock<BTreeMap<FeeKey, i64>>,

    sender_counts: DashMap<AccountAddress, usize>,

    /// Pending registry change holding each account or node key.
    registry_claims: DashMap<RegistryKey, i64>,

    admission: Mutex<()>,

    config: MempoolConfig,
}

impl<L: LedgerState> fmt::Debug for Mempool<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mempool")
            .field("size", &self.transactions.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<L: LedgerState> Mempool<L> {
    pub fn new(processor: Arc<TransactionProcessor<L>>, config: MempoolConfig) -> Self {
        Self {
            processor,
            transactions: DashMap::new(),
            fee_index: RwLock::new(BTreeMap::new()),
            sender_counts: DashMap::new(),
            registry_claims: DashMap::new(),
            admission: Mutex::new(()),
            config,
        }
    }

    pub fn processor(&self) -> &Arc<TransactionProcessor<L>> {
        &self.processor
    }

    /// Admit a transaction and reserve its spend.
    ///
    /// Checks, in order: duplicate id, per-sender limit, conflicting
    /// registry change, validation against current state, capacity
    /// (evicting the lowest-fee entry if the incoming one outbids it). Only
    /// then is the reservation applied.
    pub fn add(&self, tx: Transaction) -> Result<(), MempoolError> {
        let _guard = self.admission.lock();

        if self.transactions.contains_key(&tx.id) {
            return Err(MempoolError::DuplicateTransaction);
        }

        let sender_count = self.sender_counts.get(&tx.sender).map(|v| *v).unwrap_or(0);
        if sender_count >= self.config.max_per_sender {
            return Err(MempoolError::SenderLimitExceeded {
                sender: tx.sender.clone(),
                limit: self.config.max_per_sender,
            });
        }

        let registry_keys = RegistryKey::of(&tx);
        if let Some(pending) = registry_keys
            .iter()
            .find_map(|key| self.registry_claims.get(key).map(|id| *id))
        {
            return Err(MempoolError::RegistryChangePending { pending });
        }

        if self.processor.validate(&tx, false)? == Outcome::Unhandled {
            return Err(MempoolError::UnknownType(tx.type_code));
        }

        let fee_per_byte = tx.fee_per_byte();
        if self.transactions.len() >= self.config.max_size && !self.try_evict_lowest(fee_per_byte) {
            return Err(MempoolError::MempoolFull {
                size: self.config.max_size,
            });
        }

        self.processor.apply_unconfirmed(&tx)?;

        let entry = MempoolEntry {
            added_at: current_timestamp_secs(),
            fee_per_byte,
            transaction: tx,
        };
        let tx_id = entry.transaction.id;
        *self
            .sender_counts
            .entry(entry.transaction.sender.clone())
            .or_insert(0) += 1;
        for key in registry_keys {
            self.registry_claims.insert(key, tx_id);
        }
        self.fee_index.write().insert(FeeKey::of(&entry), tx_id);
        self.transactions.insert(tx_id, entry);
        debug!(tx = tx_id, fee_per_byte, "admitted to mempool");
        Ok(())
    }

    /// Drop a pending transaction and release its reservation.
    pub fn remove(&self, tx_id: i64) -> Option<Transaction> {
        let entry = self.take(tx_id)?;
        self.release(&entry.transaction);
        Some(entry.transaction)
    }

    /// Drop transactions that were confirmed in a block. Their reservation
    /// was consumed by confirmation, so nothing is undone. Missing ids are
    /// ignored.
    pub fn remove_included(&self, tx_ids: &[i64]) {
        for id in tx_ids {
            self.take(*id);
        }
    }

    pub fn get(&self, tx_id: i64) -> Option<Transaction> {
        self.transactions.get(&tx_id).map(|e| e.transaction.clone())
    }

    pub fn contains(&self, tx_id: i64) -> bool {
        self.transactions.contains_key(&tx_id)
    }

    /// Up to `max_count` transactions for a block at `new_block_height`,
    /// highest fee density first, skipping any that conflict with an
    /// earlier pick.
    pub fn select_for_block(
        &self,
        max_count: usize,
        new_block_timestamp: i64,
        new_block_height: u32,
    ) -> Vec<Transaction> {
        let candidates: Vec<Transaction> = {
            let index = self.fee_index.read();
            index
                .values()
                .filter_map(|id| self.transactions.get(id).map(|e| e.transaction.clone()))
                .collect()
        };

        let mut selected = Vec::with_capacity(max_count.min(candidates.len()));
        for tx in candidates {
            if selected.len() >= max_count {
                break;
            }
            let tx = tx.at_height(new_block_height);
            match self.processor.skip_mempool_transaction(
                &tx,
                &selected,
                new_block_timestamp,
                new_block_height,
            ) {
                Ok(false) => selected.push(tx),
                Ok(true) => debug!(tx = tx.id, height = new_block_height, "skipped for block"),
                Err(err) => {
                    debug!(tx = tx.id, error = %err, "skip check failed, leaving out of block")
                }
            }
        }
        selected
    }

    pub fn size(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Drop every transaction that has waited longer than
    /// `config.expiry_seconds`, releasing reservations. Returns the count.
    pub fn expire_old(&self) -> usize {
        self.expire_at(current_timestamp_secs())
    }

    /// [`expire_old`](Self::expire_old) against an explicit clock.
    pub fn expire_at(&self, now: u64) -> usize {
        let cutoff = now.saturating_sub(self.config.expiry_seconds);
        let expired_ids: Vec<i64> = self
            .transactions
            .iter()
            .filter(|entry| entry.value().added_at < cutoff)
            .map(|entry| *entry.key())
            .collect();

        let count = expired_ids.len();
        for id in expired_ids {
            self.remove(id);
        }
        if count > 0 {
            debug!(count, "expired mempool transactions");
        }
        count
    }

    pub fn pending_for_sender(&self, sender: &AccountAddress) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|entry| &entry.value().transaction.sender == sender)
            .map(|entry| entry.value().transaction.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Evict the lowest-fee entry if `incoming_fpb` outbids it.
    fn try_evict_lowest(&self, incoming_fpb: u64) -> bool {
        let lowest = {
            let index = self.fee_index.read();
            match index.iter().next_back() {
                Some((key, id)) => (u64::MAX - key.inverted_fee, *id),
                None => return false,
            }
        };
        if incoming_fpb <= lowest.0 {
            return false;
        }
        if let Some(evicted) = self.remove(lowest.1) {
            debug!(tx = evicted.id, "evicted lowest-fee transaction");
        }
        true
    }

    /// Remove an entry from every index without touching the ledger.
    fn take(&self, tx_id: i64) -> Option<MempoolEntry> {
        let (_, entry) = self.transactions.remove(&tx_id)?;
        self.fee_index.write().remove(&FeeKey::of(&entry));
        self.decrement_sender_count(&entry.transaction.sender);
        for key in RegistryKey::of(&entry.transaction) {
            self.registry_claims.remove_if(&key, |_, holder| *holder == tx_id);
        }
        Some(entry)
    }

    fn release(&self, tx: &Transaction) {
        if let Err(err) = self.processor.undo_apply_unconfirmed(tx) {
            warn!(tx = tx.id, error = %err, "failed to release reservation");
        }
    }

    fn decrement_sender_count(&self, sender: &AccountAddress) {
        if let Some(mut count) = self.sender_counts.get_mut(sender) {
            if *count <= 1 {
                drop(count);
                self.sender_counts.remove(sender);
            } else {
                *count -= 1;
            }
        }
    }
}

/// Seconds since the UNIX epoch, or 0 if the clock is before it.
fn current_timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
