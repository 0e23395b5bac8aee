//! # Fee-Vote Phases
//!
//! Fee governance runs in voting periods. Each period opens at a block and
//! has two timed phases: a commit phase where node owners submit the hash
//! of their vote, then a reveal phase where they submit the vote itself.
//!
//! ```text
//! period start ──── commit ────▶ ──── reveal ────▶ (closed until next period)
//!               [start, start+C)   [start+C, start+C+R]
//! ```
//!
//! Which block starts a period is decided by block production, not by this
//! crate; [`ScheduledVotePhase::begin_period`] is how it tells us.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeVotePhase {
    Commit,
    Reveal,
}

impl fmt::Display for FeeVotePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Reveal => write!(f, "reveal"),
        }
    }
}

/// A voting period and its phase boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteWindow {
    pub period_start_height: u32,
    pub period_start_timestamp: i64,
    pub commit_seconds: i64,
    pub reveal_seconds: i64,
}

impl VoteWindow {
    /// Phase open at `timestamp`, if any. The reveal phase end is
    /// inclusive.
    pub fn phase_at(&self, timestamp: i64) -> Option<FeeVotePhase> {
        let commit_end = self.period_start_timestamp + self.commit_seconds;
        let reveal_end = commit_end + self.reveal_seconds;
        if timestamp < self.period_start_timestamp {
            None
        } else if timestamp < commit_end {
            Some(FeeVotePhase::Commit)
        } else if timestamp <= reveal_end {
            Some(FeeVotePhase::Reveal)
        } else {
            None
        }
    }
}

/// Governance phase lookup consumed by the fee-vote kinds.
pub trait VotePhaseScheduler: Send + Sync {
    /// Voting period in force for a transaction processed at `height`.
    ///
    /// With `post_transaction` the lookup runs on the block-confirmation
    /// path, where a period opened by the block at `height` already counts.
    fn current_window(&self, height: u32, post_transaction: bool) -> Option<VoteWindow>;
}

/// In-process scheduler fed by block production.
#[derive(Debug)]
pub struct ScheduledVotePhase {
    commit_seconds: i64,
    reveal_seconds: i64,
    /// `(start_height, start_timestamp)` in ascending height order.
    periods: RwLock<Vec<(u32, i64)>>,
}

impl ScheduledVotePhase {
    pub fn new(commit_seconds: i64, reveal_seconds: i64) -> Self {
        Self {
            commit_seconds,
            reveal_seconds,
            periods: RwLock::new(Vec::new()),
        }
    }

    /// Open a new voting period at the given block. Out-of-order starts are
    /// ignored.
    pub fn begin_period(&self, height: u32, timestamp: i64) {
        let mut periods = self.periods.write();
        if periods.last().map_or(true, |(h, _)| *h < height) {
            periods.push((height, timestamp));
            tracing::info!(height, timestamp, "fee vote period started");
        }
    }
}

impl VotePhaseScheduler for ScheduledVotePhase {
    fn current_window(&self, height: u32, post_transaction: bool) -> Option<VoteWindow> {
        let periods = self.periods.read();
        periods
            .iter()
            .rev()
            .find(|(start, _)| {
                if post_transaction {
                    *start <= height
                } else {
                    *start < height
                }
            })
            .map(|(start, ts)| VoteWindow {
                period_start_height: *start,
                period_start_timestamp: *ts,
                commit_seconds: self.commit_seconds,
                reveal_seconds: self.reveal_seconds,
            })
    }
}
