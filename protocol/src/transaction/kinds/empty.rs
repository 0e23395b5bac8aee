//! Type (0,0): carries nothing and changes nothing.

use crate::ledger::{ChangeSet, StateView};
use crate::transaction::action::TransactionAction;
use crate::transaction::body::TransactionBody;
use crate::transaction::builder::Transaction;
use crate::transaction::codec::CodecError;
use crate::transaction::error::TransactionError;

#[derive(Debug, Clone)]
pub struct EmptyTransaction {
    tx: Transaction,
}

impl EmptyTransaction {
    pub fn new(tx: Transaction) -> Self {
        Self { tx }
    }

    /// The empty body is zero bytes.
    pub fn check_body(bytes: &[u8]) -> Result<(), CodecError> {
        if bytes.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                trailing: bytes.len(),
            })
        }
    }
}

impl TransactionAction for EmptyTransaction {
    fn transaction(&self) -> &Transaction {
        &self.tx
    }

    fn validate(&self, _state: &dyn StateView, _in_db_transaction: bool) -> Result<(), TransactionError> {
        Ok(())
    }

    fn apply_unconfirmed(&self, _state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        Ok(ChangeSet::new())
    }

    fn undo_apply_unconfirmed(&self, _state: &dyn StateView) -> Result<ChangeSet, TransactionError> {
        Ok(ChangeSet::new())
    }

    fn apply_confirmed(
        &self,
        _state: &dyn StateView,
        _block_timestamp: i64,
    ) -> Result<ChangeSet, TransactionError> {
        Ok(ChangeSet::new())
    }

    fn minimum_fee(&self) -> Result<i64, TransactionError> {
        Ok(0)
    }

    fn size(&self) -> u32 {
        0
    }

    fn parse_body_bytes(&self, bytes: &[u8]) -> Result<TransactionBody, TransactionError> {
        Self::check_body(bytes)?;
        Ok(TransactionBody::Empty)
    }

    fn body_bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn transaction_body(&self, tx: &mut Transaction) {
        tx.body = TransactionBody::Empty;
    }
}
