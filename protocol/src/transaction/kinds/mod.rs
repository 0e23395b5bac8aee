//! # Transaction Kinds
//!
//! One module per kind. Each holds the parsed body, the envelope and the
//! collaborators it was dispatched with, and implements
//! [`TransactionAction`](super::action::TransactionAction).
//!
//! Shared checks (spendable balance, overflow-safe totals, node address
//! syntax) live here so every kind words its failures the same way.

use std::net::{IpAddr, SocketAddr};

use super::builder::Transaction;
use super::codec::BodyCodec;
use super::error::{Reason, TransactionError};
use super::types::{AccountAddress, TransactionType};
use crate::ledger::{LedgerContext, LedgerEvent, StateView};

/// Body accessors every kind implements identically.
macro_rules! body_accessors {
    ($variant:ident, $body:ty) => {
        fn size(&self) -> u32 {
            crate::transaction::codec::BodyCodec::size(&self.body)
        }

        fn parse_body_bytes(
            &self,
            bytes: &[u8],
        ) -> Result<crate::transaction::body::TransactionBody, crate::transaction::error::TransactionError>
        {
            let body = <$body as crate::transaction::codec::BodyCodec>::parse(bytes)?;
            Ok(crate::transaction::body::TransactionBody::$variant(body))
        }

        fn body_bytes(&self) -> Vec<u8> {
            crate::transaction::codec::BodyCodec::to_bytes(&self.body)
        }

        fn transaction_body(&self, tx: &mut crate::transaction::builder::Transaction) {
            tx.body = crate::transaction::body::TransactionBody::$variant(self.body.clone());
        }
    };
}

pub mod approval_escrow;
pub mod claim_node_registration;
pub mod empty;
pub mod fee_vote_commit;
pub mod fee_vote_reveal;
pub mod liquid_payment;
pub mod liquid_payment_stop;
pub mod node_registration;
pub mod remove_node_registration;
pub mod send_money;
pub mod update_node_registration;

#[cfg(test)]
pub(crate) mod fixtures;

/// Spendable balance of `account`; zero when it has never been seen.
pub(crate) fn spendable(
    state: &dyn StateView,
    account: &AccountAddress,
) -> Result<i64, TransactionError> {
    Ok(state
        .account_balance(account)?
        .map_or(0, |b| b.spendable_balance))
}

pub(crate) fn ensure_spendable(
    state: &dyn StateView,
    account: &AccountAddress,
    needed: i64,
) -> Result<(), TransactionError> {
    if spendable(state, account)? < needed {
        return Err(TransactionError::Validation(
            Reason::InsufficientSpendableBalance,
        ));
    }
    Ok(())
}

/// Sum of amounts, failing instead of wrapping.
pub(crate) fn checked_total(amounts: &[i64]) -> Result<i64, TransactionError> {
    amounts
        .iter()
        .try_fold(0i64, |acc, a| acc.checked_add(*a))
        .ok_or(TransactionError::Validation(Reason::AmountOverflow))
}

pub(crate) fn ledger_context(tx: &Transaction, timestamp: i64, event: LedgerEvent) -> LedgerContext {
    LedgerContext {
        transaction_id: tx.id,
        block_height: tx.height,
        timestamp,
        event,
    }
}

/// A node address must be an IP literal, a socket address or a URI with a
/// host. Bare `host:port` is accepted as a URI without a scheme.
pub(crate) fn validate_node_address(address: &str) -> Result<(), TransactionError> {
    let invalid = TransactionError::Validation(Reason::InvalidNodeAddress);
    if address.is_empty() || address.trim() != address {
        return Err(invalid);
    }
    if address.parse::<IpAddr>().is_ok() || address.parse::<SocketAddr>().is_ok() {
        return Ok(());
    }
    let has_host = |candidate: &str| {
        url::Url::parse(candidate)
            .map(|u| u.host_str().map_or(false, |h| !h.is_empty()))
            .unwrap_or(false)
    };
    if has_host(address) || has_host(&format!("p2p://{}", address)) {
        Ok(())
    } else {
        Err(invalid)
    }
}

/// Already-selected transactions of `kind`, with their decoded bodies.
/// Bodies that fail to decode are ignored.
pub(crate) fn selected_bodies<'a, B: BodyCodec + 'a>(
    selected: &'a [Transaction],
    kind: TransactionType,
) -> impl Iterator<Item = (&'a Transaction, B)> + 'a {
    selected
        .iter()
        .filter(move |tx| tx.type_code == kind.type_code())
        .filter_map(|tx| B::parse(&tx.body_bytes).ok().map(|body| (tx, body)))
}
