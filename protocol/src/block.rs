//! # Block Production
//!
//! `BlockProducer` turns pending mempool transactions into a confirmed
//! block against the ledger.
//!
//! ```text
//! 1. SELECT   highest fee density first, skipping conflicting picks
//! 2. EXECUTE  apply_confirmed each; failures are dropped and released
//! 3. SETTLE   complete due liquid payments, expire timed-out escrows
//! 4. COMMIT   record the block hash, purge included transactions
//! ```
//!
//! Each stage commits to the ledger as it goes. Opening fee-vote periods is
//! the caller's job and must happen before `produce_block`.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::crypto::hash::blake3_hash;
use crate::ledger::{LedgerState, StorageError};
use crate::mempool::Mempool;
use crate::processor::Outcome;
use crate::transaction::{BlockHash, Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Failures that abort a block. A single bad transaction never does; it is
/// dropped and reported in [`ProducedBlock::tx_results`].
#[derive(Debug)]
pub enum BlockProductionError {
    /// Recording the block failed.
    Ledger(StorageError),

    /// Settling payments or escrows failed.
    Settlement(TransactionError),
}

impl fmt::Display for BlockProductionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger(e) => write!(f, "ledger error: {}", e),
            Self::Settlement(e) => write!(f, "block settlement failed: {}", e),
        }
    }
}

impl std::error::Error for BlockProductionError {}

impl From<StorageError> for BlockProductionError {
    fn from(e: StorageError) -> Self {
        Self::Ledger(e)
    }
}

impl From<TransactionError> for BlockProductionError {
    fn from(e: TransactionError) -> Self {
        Self::Settlement(e)
    }
}

// ---------------------------------------------------------------------------
// Execution Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TxResult {
    pub tx_id: i64,
    pub success: bool,
    /// Populated only when `success` is false.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProducedBlock {
    pub height: u32,
    pub timestamp: i64,
    pub hash: BlockHash,
    /// Confirmed transactions, in execution order.
    pub transactions: Vec<Transaction>,
    /// One result per attempted transaction.
    pub tx_results: Vec<TxResult>,
    pub completed_payments: usize,
    pub expired_escrows: usize,
}

// ---------------------------------------------------------------------------
// BlockProducer
// ---------------------------------------------------------------------------

pub struct BlockProducer<L: LedgerState> {
    mempool: Arc<Mempool<L>>,
}

impl<L: LedgerState> BlockProducer<L> {
    pub fn new(mempool: Arc<Mempool<L>>) -> Self {
        Self { mempool }
    }

    pub fn mempool(&self) -> &Arc<Mempool<L>> {
        &self.mempool
    }

    /// Confirm up to `max_txs` pending transactions as block `height`.
    pub fn produce_block(
        &self,
        height: u32,
        timestamp: i64,
        max_txs: usize,
    ) -> Result<ProducedBlock, BlockProductionError> {
        let processor = self.mempool.processor();

        // Stage 1: SELECT
        let candidates = self.mempool.select_for_block(max_txs, timestamp, height);
        info!(
            candidates = candidates.len(),
            height,
            "starting block production"
        );

        // Stage 2: EXECUTE
        let mut transactions = Vec::with_capacity(candidates.len());
        let mut tx_results = Vec::with_capacity(candidates.len());
        for tx in candidates {
            match processor.apply_confirmed(&tx, timestamp) {
                Ok(Outcome::Applied) => {
                    tx_results.push(TxResult {
                        tx_id: tx.id,
                        success: true,
                        error: None,
                    });
                    transactions.push(tx);
                }
                Ok(Outcome::Unhandled) => {
                    self.mempool.remove(tx.id);
                    tx_results.push(TxResult {
                        tx_id: tx.id,
                        success: false,
                        error: Some(format!("no handler for type {}", tx.type_code)),
                    });
                }
                Err(e) => {
                    debug!(tx = tx.id, error = %e, "confirmation failed, dropping from block");
                    self.mempool.remove(tx.id);
                    tx_results.push(TxResult {
                        tx_id: tx.id,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        // Stage 3: SETTLE
        let completed_payments = processor.complete_due_liquid_payments(height, timestamp)?;
        let expired_escrows = processor.expire_escrows(height, timestamp)?;

        // Stage 4: COMMIT
        let ids: Vec<i64> = transactions.iter().map(|tx| tx.id).collect();
        let hash = block_hash(height, timestamp, &ids);
        processor.ledger().put_block_hash(height, hash)?;
        self.mempool.remove_included(&ids);

        info!(
            height,
            tx_count = transactions.len(),
            dropped = tx_results.iter().filter(|r| !r.success).count(),
            completed_payments,
            expired_escrows,
            hash = %hex::encode(hash),
            "block produced"
        );

        Ok(ProducedBlock {
            height,
            timestamp,
            hash,
            transactions,
            tx_results,
            completed_payments,
            expired_escrows,
        })
    }
}

/// `blake3(height | timestamp | tx ids)`, all little-endian.
pub fn block_hash(height: u32, timestamp: i64, tx_ids: &[i64]) -> BlockHash {
    let mut bytes = Vec::with_capacity(12 + tx_ids.len() * 8);
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&timestamp.to_le_bytes());
    for id in tx_ids {
        bytes.extend_from_slice(&id.to_le_bytes());
    }
    blake3_hash(&bytes)
}
