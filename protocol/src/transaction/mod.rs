//! # Transaction Module
//!
//! Envelope, body codec, and the lifecycle every transaction kind honors on
//! its way from the mempool into a confirmed block.
//!
//! ## Architecture
//!
//! ```text
//! types.rs       — TypeCode, TransactionType, AccountAddress
//! builder.rs     — Transaction envelope and the fluent TransactionBuilder
//! codec.rs       — Little-endian body codec shared by every kind
//! body.rs        — TransactionBody, the typed body slot of the envelope
//! action.rs      — TransactionAction lifecycle trait and the TypeAction sum type
//! dispatcher.rs  — Type code to wired-up TypeAction, plus Dependencies
//! kinds/         — One module per transaction kind
//! escrow.rs      — Escrow terms and the escrow lifecycle hooks
//! fee.rs         — Pluggable fee models
//! error.rs       — TransactionError taxonomy and stable reason codes
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Dispatch**: [`TypeDispatcher::dispatch`] parses the body for the
//!    envelope's type code.
//! 2. **Admit**: `validate(false)` then `apply_unconfirmed` reserve funds.
//! 3. **Drop**: `undo_apply_unconfirmed` returns the reservation.
//! 4. **Assemble**: `skip_mempool_transaction` filters redundant picks.
//! 5. **Confirm**: `validate(true)` then `apply_confirmed`, committed
//!    atomically by the caller.
//!
//! ## Design Decisions
//!
//! - Lifecycle steps never write. They return a
//!   [`ChangeSet`](crate::ledger::ChangeSet) and the caller commits it.
//! - Transaction ids are the first eight bytes of the `sha256` of the
//!   signable bytes, read little-endian.
//! - All amounts are `i64` in the smallest unit. No floating point anywhere
//!   near balances.

pub mod action;
pub mod body;
pub mod builder;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod escrow;
pub mod fee;
pub mod kinds;
pub mod types;

pub use action::{TransactionAction, TypeAction};
pub use body::TransactionBody;
pub use builder::{Transaction, TransactionBuilder};
pub use codec::{BodyCodec, CodecError};
pub use dispatcher::{Dependencies, TypeDispatcher};
pub use error::{ErrorKind, Reason, TransactionError};
pub use escrow::{EscrowApproval, EscrowTerms, EscrowTypeAction};
pub use fee::{BlockLifetimeFeeModel, ConstantFeeModel, FeeModel};
pub use types::{AccountAddress, BlockHash, TransactionType, TypeCode};
