//! # CLI Interface
//!
//! Command-line arguments for `ember-node`, via `clap` derive.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Ember ledger node tooling.
///
/// Replays blocks of transactions through the execution core against a
/// persistent ledger, and inspects the resulting state.
#[derive(Parser, Debug)]
#[command(
    name = "ember-node",
    about = "Ember ledger block replay and inspection",
    version,
    propagate_version = true
)]
pub struct EmberNodeCli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a JSON file of blocks to the ledger.
    Replay(ReplayArgs),
    /// Print an account's balances.
    Balance(BalanceArgs),
    /// Generate a node keypair in the data directory.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// JSON file with genesis balances and blocks.
    pub blocks: PathBuf,

    /// Engine configuration (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', env = "EMBER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Ledger data directory. Created if missing.
    #[arg(long, short = 'd', env = "EMBER_DATA_DIR", default_value = "ember-data")]
    pub data_dir: PathBuf,

    /// Maximum transactions confirmed per block.
    #[arg(long, default_value_t = 1_000)]
    pub max_block_txs: usize,
}

#[derive(Parser, Debug)]
pub struct BalanceArgs {
    /// Account address.
    pub account: String,

    #[arg(long, short = 'd', env = "EMBER_DATA_DIR", default_value = "ember-data")]
    pub data_dir: PathBuf,

    /// Also print the account's settled ledger entries.
    #[arg(long)]
    pub history: bool,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    #[arg(long, short = 'd', env = "EMBER_DATA_DIR", default_value = "ember-data")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}
