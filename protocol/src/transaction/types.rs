//! Core type definitions for Ember transactions.
//!
//! These types form the vocabulary every transaction kind speaks: the
//! two-byte wire type code, the closed set of kinds it maps to, and the
//! account address that owns balances and registry rows.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SENTINEL_ADDRESS_LENGTH;

/// A 32-byte block hash, as referenced by proofs of ownership and fee votes.
pub type BlockHash = [u8; 32];

// ---------------------------------------------------------------------------
// TypeCode
// ---------------------------------------------------------------------------

/// The wire-level `(major, minor)` pair carried in every transaction
/// envelope. The major byte selects a family, the minor byte an operation
/// within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeCode {
    pub major: u8,
    pub minor: u8,
}

impl TypeCode {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.major, self.minor)
    }
}

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// Every transaction kind the engine knows how to execute.
///
/// The set is closed on purpose: adding a kind means adding a variant here,
/// a type code, a body codec and a lifecycle implementation, and the
/// compiler points at every match that needs updating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// No-op placeholder; carries no body and moves no value.
    Empty,
    /// Plain value transfer from sender to recipient.
    SendMoney,
    /// Registers a new node and locks part of the owner's balance.
    NodeRegistration,
    /// Changes key, address or locked balance of an owned node.
    UpdateNodeRegistration,
    /// Releases a node and refunds its locked balance.
    RemoveNodeRegistration,
    /// Takes ownership of a previously released node.
    ClaimNodeRegistration,
    /// Approver's decision on an escrowed transaction.
    ApprovalEscrow,
    /// Time-locked payment settled after a completion window.
    LiquidPayment,
    /// Early termination of a pending liquid payment.
    LiquidPaymentStop,
    /// First half of a fee vote: the hash of the vote.
    FeeVoteCommit,
    /// Second half of a fee vote: the vote itself.
    FeeVoteReveal,
}

impl TransactionType {
    /// All kinds, in type-code order.
    pub const ALL: [TransactionType; 11] = [
        Self::Empty,
        Self::SendMoney,
        Self::NodeRegistration,
        Self::UpdateNodeRegistration,
        Self::RemoveNodeRegistration,
        Self::ClaimNodeRegistration,
        Self::ApprovalEscrow,
        Self::LiquidPayment,
        Self::LiquidPaymentStop,
        Self::FeeVoteCommit,
        Self::FeeVoteReveal,
    ];

    pub const fn type_code(self) -> TypeCode {
        match self {
            Self::Empty => TypeCode::new(0, 0),
            Self::SendMoney => TypeCode::new(1, 0),
            Self::NodeRegistration => TypeCode::new(2, 0),
            Self::UpdateNodeRegistration => TypeCode::new(2, 1),
            Self::RemoveNodeRegistration => TypeCode::new(2, 2),
            Self::ClaimNodeRegistration => TypeCode::new(2, 3),
            Self::ApprovalEscrow => TypeCode::new(4, 0),
            Self::LiquidPayment => TypeCode::new(6, 0),
            Self::LiquidPaymentStop => TypeCode::new(6, 1),
            Self::FeeVoteCommit => TypeCode::new(7, 0),
            Self::FeeVoteReveal => TypeCode::new(7, 1),
        }
    }

    /// Map a wire code back to a kind. Unknown codes are not an error at
    /// this level; the dispatcher reports them as "no handler".
    pub fn from_type_code(code: TypeCode) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_code() == code)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::SendMoney => write!(f, "SendMoney"),
            Self::NodeRegistration => write!(f, "NodeRegistration"),
            Self::UpdateNodeRegistration => write!(f, "UpdateNodeRegistration"),
            Self::RemoveNodeRegistration => write!(f, "RemoveNodeRegistration"),
            Self::ClaimNodeRegistration => write!(f, "ClaimNodeRegistration"),
            Self::ApprovalEscrow => write!(f, "ApprovalEscrow"),
            Self::LiquidPayment => write!(f, "LiquidPayment"),
            Self::LiquidPaymentStop => write!(f, "LiquidPaymentStop"),
            Self::FeeVoteCommit => write!(f, "FeeVoteCommit"),
            Self::FeeVoteReveal => write!(f, "FeeVoteReveal"),
        }
    }
}

// ---------------------------------------------------------------------------
// AccountAddress
// ---------------------------------------------------------------------------

/// An account identifier as it appears on the wire: opaque bytes.
///
/// In human-readable formats (JSON config, block files) addresses are
/// written as UTF-8 strings when they are valid UTF-8 and as `0x`-prefixed
/// hex otherwise. Binary formats store the raw bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountAddress(Vec<u8>);

impl AccountAddress {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The all-zero owner written into a released node registry row.
    pub fn sentinel() -> Self {
        Self(vec![0u8; SENTINEL_ADDRESS_LENGTH])
    }

    pub fn is_sentinel(&self) -> bool {
        self.0.len() == SENTINEL_ADDRESS_LENGTH && self.0.iter().all(|b| *b == 0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<&str> for AccountAddress {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for AccountAddress {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if !self.is_sentinel() => write!(f, "{}", s),
            _ => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self)
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl<'de> Visitor<'de> for AddressVisitor {
            type Value = AccountAddress;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an account address as a string or bytes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                match v.strip_prefix("0x") {
                    Some(hex_part) => hex::decode(hex_part)
                        .map(AccountAddress)
                        .map_err(|e| E::custom(format!("invalid hex address: {}", e))),
                    None => Ok(AccountAddress::from(v)),
                }
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(AccountAddress(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(AccountAddress(v))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                Ok(AccountAddress(bytes))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(AddressVisitor)
        } else {
            deserializer.deserialize_bytes(AddressVisitor)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_are_unique() {
        let mut codes: Vec<TypeCode> = TransactionType::ALL.iter().map(|t| t.type_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), TransactionType::ALL.len());
    }

    #[test]
    fn type_code_lookup_round_trips() {
        for kind in TransactionType::ALL {
            assert_eq!(TransactionType::from_type_code(kind.type_code()), Some(kind));
        }
    }

    #[test]
    fn unknown_type_code_has_no_kind() {
        assert_eq!(TransactionType::from_type_code(TypeCode::new(3, 0)), None);
        assert_eq!(TransactionType::from_type_code(TypeCode::new(2, 9)), None);
    }

    #[test]
    fn well_known_codes() {
        assert_eq!(TransactionType::SendMoney.type_code(), TypeCode::new(1, 0));
        assert_eq!(TransactionType::LiquidPaymentStop.type_code(), TypeCode::new(6, 1));
        assert_eq!(TransactionType::FeeVoteReveal.type_code(), TypeCode::new(7, 1));
        assert_eq!(TypeCode::new(2, 3).to_string(), "2/3");
    }

    #[test]
    fn sentinel_address() {
        let sentinel = AccountAddress::sentinel();
        assert!(sentinel.is_sentinel());
        assert!(!AccountAddress::from("alice").is_sentinel());
        assert!(!AccountAddress::default().is_sentinel());
        assert!(sentinel.to_string().starts_with("0x0000"));
    }

    #[test]
    fn address_json_uses_strings() {
        let alice = AccountAddress::from("alice");
        let json = serde_json::to_string(&alice).unwrap();
        assert_eq!(json, "\"alice\"");
        let back: AccountAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alice);

        let sentinel_json = serde_json::to_string(&AccountAddress::sentinel()).unwrap();
        let back: AccountAddress = serde_json::from_str(&sentinel_json).unwrap();
        assert!(back.is_sentinel());
    }

    #[test]
    fn address_bincode_uses_raw_bytes() {
        let alice = AccountAddress::from("alice");
        let bytes = bincode::serialize(&alice).unwrap();
        let back: AccountAddress = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, alice);
    }
}
