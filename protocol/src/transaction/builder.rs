//! Transaction envelope and its builder.
//!
//! The [`TransactionBuilder`] takes a typed body, encodes it into
//! `body_bytes`, and derives the transaction id from the canonical envelope
//! bytes. The dispatcher only ever trusts `body_bytes`; the typed `body`
//! slot is a convenience for callers and is refilled by
//! [`TransactionAction::transaction_body`](super::action::TransactionAction::transaction_body).

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use super::body::TransactionBody;
use super::codec::put_prefixed;
use super::escrow::EscrowTerms;
use super::types::{AccountAddress, TransactionType, TypeCode};
use crate::config::TRANSACTION_VERSION;
use crate::crypto::hash::transaction_id;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A generic transaction envelope.
///
/// Immutable once built, except for `height` and `timestamp`, which the
/// caller sets to the context of the stage processing it.
///
/// # Canonical Byte Format
///
/// [`Transaction::signable_bytes`] serializes, in order: version, type code
/// major and minor, timestamp, sender, recipient, fee, body bytes and the
/// optional escrow terms. Variable fields are `u32`-length-prefixed,
/// integers little-endian. `height` is excluded because it is execution
/// context, not content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// First 8 bytes of `SHA-256(signable_bytes)`, little-endian.
    pub id: i64,

    pub version: u8,

    pub type_code: TypeCode,

    pub sender: AccountAddress,

    #[serde(default)]
    pub recipient: Option<AccountAddress>,

    /// Fee in the smallest currency unit.
    pub fee: i64,

    /// Height of the block this transaction is processed for.
    #[serde(default)]
    pub height: u32,

    /// Unix timestamp in seconds.
    pub timestamp: i64,

    /// Typed body. Informational; execution always decodes `body_bytes`.
    #[serde(default)]
    pub body: TransactionBody,

    #[serde(with = "hex::serde")]
    pub body_bytes: Vec<u8>,

    #[serde(default)]
    pub escrow: Option<EscrowTerms>,
}

impl Transaction {
    /// Canonical bytes used for the transaction id and client signatures.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.body_bytes.len());

        buf.put_u8(self.version);
        buf.put_u8(self.type_code.major);
        buf.put_u8(self.type_code.minor);
        buf.put_i64_le(self.timestamp);
        put_prefixed(&mut buf, self.sender.as_bytes());
        put_prefixed(
            &mut buf,
            self.recipient.as_ref().map(|r| r.as_bytes()).unwrap_or(&[][..]),
        );
        buf.put_i64_le(self.fee);
        put_prefixed(&mut buf, &self.body_bytes);

        match &self.escrow {
            Some(terms) => {
                buf.put_u8(0x01);
                put_prefixed(&mut buf, terms.approver.as_bytes());
                buf.put_i64_le(terms.commission);
                buf.put_u32_le(terms.timeout);
                put_prefixed(&mut buf, terms.instruction.as_bytes());
            }
            None => buf.put_u8(0x00),
        }

        buf
    }

    pub fn compute_id(&self) -> i64 {
        transaction_id(&self.signable_bytes())
    }

    /// Envelope size in bytes, as used for fee density.
    pub fn size_bytes(&self) -> usize {
        self.signable_bytes().len()
    }

    /// Fee per envelope byte. Negative fees count as zero.
    pub fn fee_per_byte(&self) -> u64 {
        let size = self.size_bytes() as u64;
        if size == 0 {
            return 0;
        }
        self.fee.max(0) as u64 / size
    }

    pub fn kind(&self) -> Option<TransactionType> {
        TransactionType::from_type_code(self.type_code)
    }

    /// Same transaction, processed in the context of another block.
    pub fn at_height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Transaction`]s.
///
/// ```rust
/// use ember_protocol::transaction::{TransactionBuilder, TransactionType};
/// use ember_protocol::transaction::kinds::send_money::SendMoneyBody;
///
/// let tx = TransactionBuilder::new(TransactionType::SendMoney)
///     .sender("alice")
///     .recipient("bob")
///     .fee(1_000)
///     .height(12)
///     .timestamp(1_700_000_000)
///     .body(SendMoneyBody { amount: 50 })
///     .build();
/// assert_eq!(tx.body_bytes, 50i64.to_le_bytes().to_vec());
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    kind: TransactionType,
    version: u8,
    sender: AccountAddress,
    recipient: Option<AccountAddress>,
    fee: i64,
    height: u32,
    timestamp: i64,
    body: TransactionBody,
    escrow: Option<EscrowTerms>,
}

impl TransactionBuilder {
    pub fn new(kind: TransactionType) -> Self {
        Self {
            kind,
            version: TRANSACTION_VERSION,
            sender: AccountAddress::default(),
            recipient: None,
            fee: 0,
            height: 0,
            timestamp: 0,
            body: TransactionBody::Empty,
            escrow: None,
        }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn sender(mut self, sender: impl Into<AccountAddress>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn recipient(mut self, recipient: impl Into<AccountAddress>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn fee(mut self, fee: i64) -> Self {
        self.fee = fee;
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = height;
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn body(mut self, body: impl Into<TransactionBody>) -> Self {
        self.body = body.into();
        self
    }

    pub fn escrow(mut self, terms: EscrowTerms) -> Self {
        self.escrow = Some(terms);
        self
    }

    /// Encode the body and compute the id.
    pub fn build(self) -> Transaction {
        let body_bytes = self.body.to_bytes();
        let mut tx = Transaction {
            id: 0,
            version: self.version,
            type_code: self.kind.type_code(),
            sender: self.sender,
            recipient: self.recipient,
            fee: self.fee,
            height: self.height,
            timestamp: self.timestamp,
            body: self.body,
            body_bytes,
            escrow: self.escrow,
        };
        tx.id = tx.compute_id();
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::kinds::liquid_payment::LiquidPaymentBody;
    use crate::transaction::kinds::send_money::SendMoneyBody;

    fn send(amount: i64) -> Transaction {
        TransactionBuilder::new(TransactionType::SendMoney)
            .sender("alice")
            .recipient("bob")
            .fee(10)
            .height(5)
            .timestamp(1_700_000_000)
            .body(SendMoneyBody { amount })
            .build()
    }

    #[test]
    fn build_sets_type_code_and_body_bytes() {
        let tx = send(50);
        assert_eq!(tx.type_code, TypeCode::new(1, 0));
        assert_eq!(tx.body_bytes, 50i64.to_le_bytes().to_vec());
        assert_eq!(tx.kind(), Some(TransactionType::SendMoney));
    }

    #[test]
    fn id_is_deterministic_and_content_bound() {
        assert_eq!(send(50).id, send(50).id);
        assert_ne!(send(50).id, send(51).id);
        assert_eq!(send(50).id, send(50).compute_id());
    }

    #[test]
    fn height_does_not_change_the_id() {
        let tx = send(50);
        let moved = tx.clone().at_height(99);
        assert_eq!(moved.compute_id(), tx.id);
    }

    #[test]
    fn escrow_terms_change_the_id() {
        let plain = send(50);
        let escrowed = TransactionBuilder::new(TransactionType::SendMoney)
            .sender("alice")
            .recipient("bob")
            .fee(10)
            .height(5)
            .timestamp(1_700_000_000)
            .body(SendMoneyBody { amount: 50 })
            .escrow(EscrowTerms {
                approver: AccountAddress::from("carol"),
                commission: 1,
                timeout: 20,
                instruction: String::new(),
            })
            .build();
        assert_ne!(plain.id, escrowed.id);
    }

    #[test]
    fn json_round_trip() {
        let tx = TransactionBuilder::new(TransactionType::LiquidPayment)
            .sender("alice")
            .recipient("bob")
            .fee(10)
            .timestamp(1_700_000_000)
            .body(LiquidPaymentBody {
                amount: 1_000,
                complete_minutes: 200,
            })
            .build();
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("e803000000000000c800000000000000"));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn fee_per_byte_ignores_negative_fees() {
        let mut tx = send(1);
        tx.fee = -5;
        assert_eq!(tx.fee_per_byte(), 0);
    }
}
