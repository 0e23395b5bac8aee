//! # Engine Configuration & Constants
//!
//! Every magic number in the execution core lives here. Wire-level constants
//! are `const` because changing them forks the chain; operational knobs
//! (fees, vote-phase durations, mempool limits) live in [`EngineConfig`] so
//! a devnet can tune them from a JSON file without a rebuild.
//!
//! Changing a wire constant after genesis is a hard fork. Changing a fee
//! after genesis is merely a governance argument.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

/// Envelope version stamped into every transaction we build.
pub const TRANSACTION_VERSION: u8 = 1;

/// Width of every length prefix in a transaction body. Four bytes,
/// little-endian, no exceptions.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Node public keys are raw Ed25519 points: always 32 bytes on the wire.
pub const NODE_PUBLIC_KEY_LENGTH: usize = 32;

/// Block hashes referenced by proofs of ownership and fee-vote reveals.
pub const BLOCK_HASH_LENGTH: usize = 32;

/// Signature slot inside a proof of ownership. Fixed width, unlike the
/// length-prefixed voter signature in a fee-vote reveal.
pub const POOWN_SIGNATURE_LENGTH: usize = 64;

/// Length of the all-zero sentinel owner written into a removed node's
/// registry row. Nothing can sign for it, so nothing can own it.
pub const SENTINEL_ADDRESS_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Monetary Units
// ---------------------------------------------------------------------------

/// One whole EMBER in its smallest unit. All balances, fees and locked
/// amounts are `i64` multiples of this. No floats near money, ever.
pub const ONE_EMBER: i64 = 100_000_000;

/// Flat fee charged by the constant fee model: 0.01 EMBER.
pub const DEFAULT_CONSTANT_FEE: i64 = ONE_EMBER / 100;

/// Escrowed transactions pay per block period they may sit unresolved.
pub const DEFAULT_ESCROW_BLOCKS_PER_PERIOD: u32 = 5;

/// Fee for each started escrow block period.
pub const DEFAULT_ESCROW_FEE_PER_PERIOD: i64 = ONE_EMBER / 100;

// ---------------------------------------------------------------------------
// Node Registry
// ---------------------------------------------------------------------------

/// How many blocks old the block referenced by a proof of ownership may
/// be. Short enough that a leaked proof goes stale quickly.
pub const DEFAULT_MAX_POOWN_AGE: u32 = 10;

// ---------------------------------------------------------------------------
// Fee-Vote Governance
// ---------------------------------------------------------------------------

/// Commit phase length, measured from the start of a voting period.
pub const DEFAULT_FEE_VOTE_COMMIT_SECONDS: i64 = 2 * 60 * 60;

/// Reveal phase length, immediately following the commit phase.
pub const DEFAULT_FEE_VOTE_REVEAL_SECONDS: i64 = 60 * 60;

// ---------------------------------------------------------------------------
// Mempool
// ---------------------------------------------------------------------------

/// Maximum number of transactions the pool holds before it starts evicting.
pub const DEFAULT_MEMPOOL_MAX_SIZE: usize = 10_000;

/// Per-sender pending limit. Keeps one account from owning the pool.
pub const DEFAULT_MEMPOOL_MAX_PER_SENDER: usize = 100;

/// Seconds a transaction may wait for inclusion before it is dropped and
/// its reservation undone.
pub const DEFAULT_MEMPOOL_EXPIRY_SECONDS: u64 = 3_600;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Errors raised when an [`EngineConfig`] is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("escrow_blocks_per_period must be at least 1")]
    ZeroEscrowPeriod,

    #[error("{field} must not be negative (got {value})")]
    NegativeValue { field: &'static str, value: i64 },

    #[error("fee vote phase durations must be positive")]
    EmptyVotePhase,

    #[error("mempool limits must be positive")]
    EmptyMempool,
}

/// Operational parameters for the execution core.
///
/// Every field has a default, so a config file only needs to mention what
/// it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fee floor for non-escrowed transactions.
    pub constant_fee: i64,
    /// Block period used by the escrow fee model.
    pub escrow_blocks_per_period: u32,
    /// Fee per started escrow period.
    pub escrow_fee_per_period: i64,
    /// Maximum age, in blocks, of a proof-of-ownership reference block.
    pub max_poown_age: u32,
    pub fee_vote_commit_seconds: i64,
    pub fee_vote_reveal_seconds: i64,
    pub mempool_max_size: usize,
    pub mempool_max_per_sender: usize,
    pub mempool_expiry_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            constant_fee: DEFAULT_CONSTANT_FEE,
            escrow_blocks_per_period: DEFAULT_ESCROW_BLOCKS_PER_PERIOD,
            escrow_fee_per_period: DEFAULT_ESCROW_FEE_PER_PERIOD,
            max_poown_age: DEFAULT_MAX_POOWN_AGE,
            fee_vote_commit_seconds: DEFAULT_FEE_VOTE_COMMIT_SECONDS,
            fee_vote_reveal_seconds: DEFAULT_FEE_VOTE_REVEAL_SECONDS,
            mempool_max_size: DEFAULT_MEMPOOL_MAX_SIZE,
            mempool_max_per_sender: DEFAULT_MEMPOOL_MAX_PER_SENDER,
            mempool_expiry_seconds: DEFAULT_MEMPOOL_EXPIRY_SECONDS,
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check the config for values that would make the fee models or the
    /// vote scheduler misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.escrow_blocks_per_period == 0 {
            return Err(ConfigError::ZeroEscrowPeriod);
        }
        for (field, value) in [
            ("constant_fee", self.constant_fee),
            ("escrow_fee_per_period", self.escrow_fee_per_period),
        ] {
            if value < 0 {
                return Err(ConfigError::NegativeValue { field, value });
            }
        }
        if self.fee_vote_commit_seconds <= 0 || self.fee_vote_reveal_seconds <= 0 {
            return Err(ConfigError::EmptyVotePhase);
        }
        if self.mempool_max_size == 0 || self.mempool_max_per_sender == 0 {
            return Err(ConfigError::EmptyMempool);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_constants_are_consistent() {
        assert_eq!(NODE_PUBLIC_KEY_LENGTH, crate::crypto::keys::PUBLIC_KEY_LENGTH);
        assert_eq!(POOWN_SIGNATURE_LENGTH, crate::crypto::keys::SIGNATURE_LENGTH);
        assert_eq!(LENGTH_PREFIX_SIZE, std::mem::size_of::<u32>());
    }

    #[test]
    fn default_fees_are_sane() {
        assert!(DEFAULT_CONSTANT_FEE > 0);
        assert!(DEFAULT_CONSTANT_FEE < ONE_EMBER);
        assert!(DEFAULT_ESCROW_BLOCKS_PER_PERIOD > 0);
    }

    #[test]
    fn default_config_validates() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(r#"{ "constant_fee": 42 }"#).unwrap();
        assert_eq!(cfg.constant_fee, 42);
        assert_eq!(cfg.max_poown_age, DEFAULT_MAX_POOWN_AGE);
        assert_eq!(cfg.mempool_max_size, DEFAULT_MEMPOOL_MAX_SIZE);
    }

    #[test]
    fn zero_escrow_period_is_rejected() {
        let cfg = EngineConfig {
            escrow_blocks_per_period: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroEscrowPeriod));
    }

    #[test]
    fn negative_fee_is_rejected() {
        let cfg = EngineConfig {
            constant_fee: -1,
            ..EngineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NegativeValue { field: "constant_fee", .. })
        ));
    }
}
