//! Body codec shared by every transaction kind.
//!
//! Bodies are a flat sequence of fields: little-endian fixed-width integers,
//! fixed 32-byte keys and hashes, and variable-length fields preceded by a
//! 4-byte little-endian length. There are no tags and no padding, so the
//! encoding of a body is unique and `size()` can be computed without
//! encoding.

use bytes::{Buf, BufMut};

use crate::config::LENGTH_PREFIX_SIZE;

/// Errors raised while decoding body bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("body too short reading {field}: need {needed} bytes, {available} available")]
    UnexpectedEnd {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid value for {field}: {detail}")]
    InvalidValue { field: &'static str, detail: String },

    #[error("{trailing} unexpected trailing bytes after body")]
    TrailingBytes { trailing: usize },
}

/// Cursor over body bytes. Every read names the field it is reading so a
/// short buffer produces an error that says exactly where it ran out.
pub struct BodyReader<'a> {
    buf: &'a [u8],
}

impl<'a> BodyReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::UnexpectedEnd {
                field,
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        self.ensure(field, 4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, CodecError> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn i64(&mut self, field: &'static str) -> Result<i64, CodecError> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn array32(&mut self, field: &'static str) -> Result<[u8; 32], CodecError> {
        self.ensure(field, 32)?;
        let mut out = [0u8; 32];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub fn bytes(&mut self, field: &'static str, len: usize) -> Result<Vec<u8>, CodecError> {
        self.ensure(field, len)?;
        let mut out = vec![0u8; len];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Read a `u32` length followed by that many bytes.
    pub fn prefixed(&mut self, field: &'static str) -> Result<Vec<u8>, CodecError> {
        let len = self.u32(field)? as usize;
        self.bytes(field, len)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn prefixed_string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let raw = self.prefixed(field)?;
        String::from_utf8(raw).map_err(|e| CodecError::InvalidValue {
            field,
            detail: e.to_string(),
        })
    }

    /// Ensure the whole buffer was consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.buf.has_remaining() {
            return Err(CodecError::TrailingBytes {
                trailing: self.buf.remaining(),
            });
        }
        Ok(())
    }
}

/// Append a `u32` length prefix followed by `data`.
pub fn put_prefixed(buf: &mut Vec<u8>, data: &[u8]) {
    buf.put_u32_le(data.len() as u32);
    buf.put_slice(data);
}

/// Encoded size of a length-prefixed field holding `len` bytes.
pub const fn prefixed_size(len: usize) -> usize {
    LENGTH_PREFIX_SIZE + len
}

/// Encoding contract implemented by every body type.
pub trait BodyCodec: Sized {
    /// Exact encoded size in bytes.
    fn size(&self) -> u32;

    fn write_to(&self, buf: &mut Vec<u8>);

    fn read_from(reader: &mut BodyReader<'_>) -> Result<Self, CodecError>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size() as usize);
        self.write_to(&mut buf);
        buf
    }

    /// Decode a complete body. Trailing bytes are rejected.
    fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = BodyReader::new(bytes);
        let body = Self::read_from(&mut reader)?;
        reader.finish()?;
        Ok(body)
    }
}
