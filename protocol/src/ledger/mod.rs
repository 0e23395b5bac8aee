//! # Ledger
//!
//! Account balances, the node registry, liquid payments, fee votes and
//! escrows, behind a read trait and an atomic commit.
//!
//! ```text
//! model.rs    — persisted record types
//! changes.rs  — Mutation commands and the ChangeSet that carries them
//! view.rs     — StateView / LedgerState traits and StorageError
//! memory.rs   — in-memory backend (tests, tooling)
//! db.rs       — sled backend
//! ```

pub mod changes;
pub mod db;
pub mod memory;
pub mod model;
pub mod view;

pub use changes::{ChangeSet, LedgerContext, Mutation};
pub use db::LedgerDB;
pub use memory::MemoryLedger;
pub use model::{
    AccountBalance, AccountLedgerEntry, EscrowRecord, EscrowStatus, FeeVoteCommitRecord,
    FeeVoteRevealRecord, LedgerEvent, LiquidPaymentRecord, NodeRecord, PaymentStatus,
};
pub use view::{LedgerState, StateView, StorageError, StorageResult};
