// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ember Node
//!
//! Entry point for the `ember-node` binary.
//!
//! - `replay`  — apply a JSON file of blocks to the ledger
//! - `balance` — print an account's balances and, optionally, its history
//! - `keygen`  — generate a node keypair for registration
//! - `version` — print build version information

mod cli;
mod logging;
mod replay;

use anyhow::{Context, Result};
use clap::Parser;

use ember_protocol::config::EngineConfig;
use ember_protocol::crypto::keys::NodeKeypair;
use ember_protocol::ledger::{LedgerDB, LedgerState, StateView};

use cli::{Commands, EmberNodeCli};

fn main() -> Result<()> {
    let cli = EmberNodeCli::parse();
    logging::init_logging("ember_node=info,ember_protocol=info", cli.log_format.into());

    match cli.command {
        Commands::Replay(args) => run_replay(args),
        Commands::Balance(args) => show_balance(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            EngineConfig::from_json(&raw)
                .with_context(|| format!("malformed config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    config.validate().context("invalid engine config")?;
    Ok(config)
}

fn run_replay(args: cli::ReplayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create data directory {}", args.data_dir.display()))?;

    tracing::info!(
        blocks = %args.blocks.display(),
        data_dir = %args.data_dir.display(),
        "starting replay"
    );
    let file = replay::load(&args.blocks)?;
    let reports = replay::replay(&config, &args.data_dir, &file, args.max_block_txs)?;

    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }
    tracing::info!(applied = reports.len(), "replay finished");
    Ok(())
}

fn show_balance(args: cli::BalanceArgs) -> Result<()> {
    let ledger = LedgerDB::open(&args.data_dir)
        .with_context(|| format!("failed to open ledger at {}", args.data_dir.display()))?;
    let account = args.account.as_str().into();

    match ledger.account_balance(&account)? {
        Some(balance) => println!("{}", serde_json::to_string_pretty(&balance)?),
        None => println!("account {} has no balance", args.account),
    }
    if let Some(node) = ledger.node_by_account(&account)? {
        println!("{}", serde_json::to_string_pretty(&node)?);
    }
    if args.history {
        for entry in ledger.account_ledger(&account)? {
            println!("{}", serde_json::to_string(&entry)?);
        }
    }
    Ok(())
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let data_dir = &args.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let keypair = NodeKeypair::generate();
    let key_path = data_dir.join("node.key");
    std::fs::write(&key_path, hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write node key to {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    let public_key = keypair.public_key().to_hex();
    tracing::info!(public_key = %public_key, key_path = %key_path.display(), "node keypair generated");
    println!("Node key     : {}", key_path.display());
    println!("Public key   : {}", public_key);
    Ok(())
}

fn print_version() {
    println!("ember-node {}", env!("CARGO_PKG_VERSION"));
    println!(
        "transaction version {}",
        ember_protocol::config::TRANSACTION_VERSION
    );
}
