//! Declarative object codec
//!
//! Domain objects describe their wire layout once as a static field list
//! (`Schema`). The codec walks that list in order to turn a `Record` into
//! bytes and back. Field order is part of both the wire format and the hash
//! domain.

pub mod codec;
pub mod schema;
pub mod unlimited;

pub use codec::{decode, encode, Record, Value};
pub use schema::{Field, FieldKind, LengthPrefix, Schema};
pub use unlimited::{decode_length_from_unlimited, encode_length_for_unlimited};

use crate::binary::Hash;
use crate::utils::sha256_digest;
use std::fmt;

/// Codec failures. Callers treat both as "reject this input".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Encode(String),
    Decode(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(msg) => write!(f, "encode failed: {msg}"),
            CodecError::Decode(msg) => write!(f, "decode failed: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// A domain object with a static wire schema.
pub trait Encodable: Sized {
    const SCHEMA: &'static Schema;

    fn to_record(&self) -> Record;

    fn from_record(record: Record) -> Result<Self, CodecError>;

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        encode(&self.to_record(), Self::SCHEMA, false)
    }

    /// Encoding with every `hash_remove` field skipped.
    fn encode_for_hash(&self) -> Result<Vec<u8>, CodecError> {
        encode(&self.to_record(), Self::SCHEMA, true)
    }

    fn calculate_hash(&self) -> Result<Hash, CodecError> {
        Ok(sha256_digest(&self.encode_for_hash()?))
    }

    /// Decodes an object that must span the whole buffer.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (value, consumed) = Self::decode_prefix(bytes)?;
        if consumed != bytes.len() {
            return Err(CodecError::Decode(format!(
                "{} trailing bytes after object",
                bytes.len() - consumed
            )));
        }
        Ok(value)
    }

    /// Decodes an object at the start of `bytes`, reporting how many bytes
    /// it occupied.
    fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let (record, consumed) = decode(bytes, Self::SCHEMA)?;
        Ok((Self::from_record(record)?, consumed))
    }
}
