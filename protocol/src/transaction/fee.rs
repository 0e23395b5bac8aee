//! Pluggable fee models.
//!
//! A kind's minimum fee is whatever its [`FeeModel`] says. Plain
//! transactions use a flat fee; escrowed ones pay for every block period
//! their funds may sit waiting for the approver.

use super::builder::Transaction;
use super::error::{Reason, TransactionError};

pub trait FeeModel: Send + Sync {
    /// Fee floor for `tx`. Never negative.
    fn minimum_fee(&self, tx: &Transaction) -> Result<i64, TransactionError>;
}

/// Same fee for every transaction.
#[derive(Debug, Clone, Copy)]
pub struct ConstantFeeModel {
    fee: i64,
}

impl ConstantFeeModel {
    pub fn new(fee: i64) -> Self {
        Self { fee: fee.max(0) }
    }
}

impl FeeModel for ConstantFeeModel {
    fn minimum_fee(&self, _tx: &Transaction) -> Result<i64, TransactionError> {
        Ok(self.fee)
    }
}

/// Fee proportional to how long an escrow may stay open:
/// `ceil(lifetime / blocks_per_period) * fee_per_period`, where lifetime is
/// `timeout - height` blocks (at least one).
#[derive(Debug, Clone, Copy)]
pub struct BlockLifetimeFeeModel {
    blocks_per_period: u32,
    fee_per_period: i64,
}

impl BlockLifetimeFeeModel {
    pub fn new(blocks_per_period: u32, fee_per_period: i64) -> Self {
        Self {
            blocks_per_period: blocks_per_period.max(1),
            fee_per_period: fee_per_period.max(0),
        }
    }
}

impl FeeModel for BlockLifetimeFeeModel {
    fn minimum_fee(&self, tx: &Transaction) -> Result<i64, TransactionError> {
        let lifetime = tx
            .escrow
            .as_ref()
            .map(|terms| terms.timeout.saturating_sub(tx.height))
            .unwrap_or(0)
            .max(1);
        let periods = lifetime.div_ceil(self.blocks_per_period);
        i64::from(periods)
            .checked_mul(self.fee_per_period)
            .ok_or(TransactionError::Validation(Reason::AmountOverflow))
    }
}
