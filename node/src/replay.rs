//! # Block Replay
//!
//! Feeds a recorded chain through the execution core: each block's
//! transactions are admitted to the mempool, then the block producer
//! confirms them at the block's height and timestamp.
//!
//! Input format:
//!
//! ```json
//! {
//!   "genesis": [{ "account": "alice", "balance": 1000000000 }],
//!   "blocks": [
//!     { "height": 1, "timestamp": 1700000060, "starts_vote_period": false,
//!       "transactions": [ ... ] }
//!   ]
//! }
//! ```
//!
//! Genesis balances are only seeded into an empty ledger. Blocks at or
//! below the ledger's recorded tip are skipped, so replaying a file twice
//! is harmless.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use ember_protocol::block::{block_hash, BlockProducer};
use ember_protocol::config::EngineConfig;
use ember_protocol::governance::ScheduledVotePhase;
use ember_protocol::ledger::{LedgerDB, LedgerState, StateView};
use ember_protocol::mempool::{Mempool, MempoolConfig};
use ember_protocol::processor::TransactionProcessor;
use ember_protocol::transaction::{Dependencies, Transaction, TypeDispatcher};

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayFile {
    #[serde(default)]
    pub genesis: Vec<GenesisBalance>,
    pub blocks: Vec<BlockSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisBalance {
    pub account: String,
    pub balance: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockSpec {
    pub height: u32,
    pub timestamp: i64,
    #[serde(default)]
    pub starts_vote_period: bool,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// One line of replay output per applied block.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BlockReport {
    pub height: u32,
    pub hash: String,
    pub confirmed: usize,
    pub rejected: usize,
    pub dropped: usize,
    pub completed_payments: usize,
    pub expired_escrows: usize,
}

pub fn load(path: &Path) -> Result<ReplayFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read block file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("malformed block file {}", path.display()))
}

/// Replay `file` into the ledger at `data_dir`.
pub fn replay(
    config: &EngineConfig,
    data_dir: &Path,
    file: &ReplayFile,
    max_block_txs: usize,
) -> Result<Vec<BlockReport>> {
    let ledger = Arc::new(
        LedgerDB::open(data_dir)
            .with_context(|| format!("failed to open ledger at {}", data_dir.display()))?,
    );

    if ledger.block_hash(0)?.is_none() {
        for entry in &file.genesis {
            ledger
                .seed_balance(&entry.account.as_str().into(), entry.balance)
                .with_context(|| format!("failed to seed genesis balance for {}", entry.account))?;
        }
        ledger.put_block_hash(0, block_hash(0, 0, &[]))?;
        tracing::info!(accounts = file.genesis.len(), "genesis seeded");
    }

    let phases = Arc::new(ScheduledVotePhase::new(
        config.fee_vote_commit_seconds,
        config.fee_vote_reveal_seconds,
    ));
    let deps = Dependencies::from_config(config).with_vote_phase(phases.clone());
    let processor = TransactionProcessor::new(Arc::clone(&ledger), TypeDispatcher::new(deps));
    let mempool = Arc::new(Mempool::new(Arc::new(processor), MempoolConfig::from(config)));
    let producer = BlockProducer::new(mempool);

    let mut reports = Vec::with_capacity(file.blocks.len());
    let mut tip = tip_height(&*ledger)?;
    for block in &file.blocks {
        if block.height <= tip {
            tracing::debug!(height = block.height, tip, "block already applied, skipping");
            continue;
        }
        if block.height != tip + 1 {
            bail!("block {} does not follow tip {}", block.height, tip);
        }
        if block.starts_vote_period {
            phases.begin_period(block.height, block.timestamp);
        }

        let mut rejected = 0;
        for tx in &block.transactions {
            if tx.compute_id() != tx.id {
                tracing::warn!(tx = tx.id, "transaction id does not match its content");
                rejected += 1;
                continue;
            }
            if let Err(err) = producer.mempool().add(tx.clone().at_height(block.height)) {
                tracing::warn!(tx = tx.id, height = block.height, error = %err, "transaction rejected");
                rejected += 1;
            }
        }

        let produced = producer
            .produce_block(block.height, block.timestamp, max_block_txs)
            .with_context(|| format!("failed to produce block {}", block.height))?;
        reports.push(BlockReport {
            height: produced.height,
            hash: hex::encode(produced.hash),
            confirmed: produced.transactions.len(),
            rejected,
            dropped: produced.tx_results.iter().filter(|r| !r.success).count(),
            completed_payments: produced.completed_payments,
            expired_escrows: produced.expired_escrows,
        });
        tip = block.height;
    }

    ledger.flush()?;
    Ok(reports)
}

/// Highest height with a recorded block hash.
fn tip_height(ledger: &dyn StateView) -> Result<u32> {
    let mut height = 0;
    while ledger.block_hash(height + 1)?.is_some() {
        height += 1;
    }
    Ok(height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_protocol::config::DEFAULT_CONSTANT_FEE;
    use ember_protocol::transaction::kinds::send_money::SendMoneyBody;
    use ember_protocol::transaction::{TransactionBuilder, TransactionType};

    fn transfer(amount: i64, timestamp: i64) -> Transaction {
        TransactionBuilder::new(TransactionType::SendMoney)
            .sender("alice")
            .recipient("bob")
            .fee(DEFAULT_CONSTANT_FEE)
            .timestamp(timestamp)
            .body(SendMoneyBody { amount })
            .build()
    }

    fn file() -> ReplayFile {
        ReplayFile {
            genesis: vec![GenesisBalance {
                account: "alice".into(),
                balance: 10 * DEFAULT_CONSTANT_FEE,
            }],
            blocks: vec![
                BlockSpec {
                    height: 1,
                    timestamp: 1_700_000_060,
                    starts_vote_period: false,
                    transactions: vec![transfer(500, 1_700_000_001)],
                },
                BlockSpec {
                    height: 2,
                    timestamp: 1_700_000_120,
                    starts_vote_period: true,
                    transactions: vec![transfer(100 * DEFAULT_CONSTANT_FEE, 1_700_000_002)],
                },
            ],
        }
    }

    #[test]
    fn replays_blocks_into_ledger() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reports = replay(&EngineConfig::default(), dir.path(), &file(), 100).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].confirmed, 1);
        assert_eq!(reports[1].confirmed, 0);
        assert_eq!(reports[1].rejected, 1);

        let ledger = LedgerDB::open(dir.path()).unwrap();
        let bob = ledger.account_balance(&"bob".into()).unwrap().unwrap();
        assert_eq!(bob.balance, 500);
        assert_eq!(tip_height(&ledger).unwrap(), 2);
    }

    #[test]
    fn second_replay_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        replay(&EngineConfig::default(), dir.path(), &file(), 100).unwrap();
        let again = replay(&EngineConfig::default(), dir.path(), &file(), 100).unwrap();
        assert!(again.is_empty());

        let ledger = LedgerDB::open(dir.path()).unwrap();
        let alice = ledger.account_balance(&"alice".into()).unwrap().unwrap();
        assert_eq!(alice.balance, 10 * DEFAULT_CONSTANT_FEE - 500 - DEFAULT_CONSTANT_FEE);
    }

    #[test]
    fn gap_in_heights_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = file();
        file.blocks[1].height = 5;
        assert!(replay(&EngineConfig::default(), dir.path(), &file, 100).is_err());
    }

    #[test]
    fn block_file_parses_from_json() {
        let tx = transfer(1, 1);
        let json = serde_json::json!({
            "genesis": [{ "account": "alice", "balance": 5 }],
            "blocks": [{ "height": 1, "timestamp": 60, "transactions": [tx] }]
        });
        let parsed: ReplayFile = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.blocks[0].transactions[0], transfer(1, 1));
        assert!(!parsed.blocks[0].starts_vote_period);
    }
}
