// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ember Protocol — Transaction Execution Core
//!
//! Everything a node needs to decide whether a transaction is valid and to
//! apply it to the ledger: the binary body codecs for each transaction
//! kind, the four-step lifecycle (validate, apply unconfirmed, undo, apply
//! confirmed), fee models, escrow, liquid payments, the node registry and
//! fee-vote governance.
//!
//! ## Architecture
//!
//! - **crypto** — Ed25519 node keys and the hashes transaction ids use.
//! - **auth** — Proof-of-ownership and voter-signature verification.
//! - **transaction** — Envelope, body codecs, kinds and their dispatcher.
//! - **ledger** — State traits plus the in-memory and sled backends.
//! - **governance** — Fee-vote period and phase scheduling.
//! - **processor** — Runs transactions through their lifecycle.
//! - **mempool** — Fee-ordered pool of reserved, unconfirmed transactions.
//! - **block** — Confirms mempool transactions into blocks.
//! - **config** — Wire constants and the operational `EngineConfig`.
//!
//! ## Ground Rules
//!
//! 1. All money is `i64` in the smallest unit. Arithmetic is checked.
//! 2. Every change a lifecycle step makes is one atomic `ChangeSet`.
//! 3. Rejections carry a machine-readable `Reason`, never a bare string.

pub mod auth;
pub mod block;
pub mod config;
pub mod crypto;
pub mod governance;
pub mod ledger;
pub mod mempool;
pub mod processor;
pub mod transaction;
