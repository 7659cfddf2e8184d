//! Binary value types
//!
//! Every number, hash, address and signature on the wire is an unsigned
//! big-endian byte string. `Uint` is the variable-width form, `FixedUint<N>`
//! the fixed-width one.

pub mod fixed;
pub mod uint;

pub use fixed::{FixedUint, Hash, Signature, Uint16, Uint256, Uint32, Uint64, Uint8};
pub use uint::Uint;

use std::fmt;

/// Errors raised while constructing or converting binary values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryError {
    /// Raw input does not match a fixed-width type
    InvalidLength { expected: usize, actual: usize },
    /// Value does not fit into the requested number of bytes
    Overflow { max_bytes: usize },
    /// Hex string could not be parsed
    InvalidHex(String),
}

impl fmt::Display for BinaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryError::InvalidLength { expected, actual } => {
                write!(f, "invalid length: expected {expected} bytes, got {actual}")
            }
            BinaryError::Overflow { max_bytes } => {
                write!(f, "value does not fit into {max_bytes} bytes")
            }
            BinaryError::InvalidHex(msg) => write!(f, "invalid hex: {msg}"),
        }
    }
}

impl std::error::Error for BinaryError {}

/// Drops leading zero bytes.
pub(crate) fn significant_bytes(raw: &[u8]) -> &[u8] {
    let first = raw.iter().position(|b| *b != 0).unwrap_or(raw.len());
    &raw[first..]
}

/// Left-pads `raw` with zeros to `len` bytes, failing if it has more
/// significant bytes than that.
pub(crate) fn pad_to(raw: &[u8], len: usize) -> Result<Vec<u8>, BinaryError> {
    let significant = significant_bytes(raw);
    if significant.len() > len {
        return Err(BinaryError::Overflow { max_bytes: len });
    }
    let mut out = vec![0u8; len - significant.len()];
    out.extend_from_slice(significant);
    Ok(out)
}

pub(crate) fn decode_hex(input: &str) -> Result<Vec<u8>, BinaryError> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    data_encoding::HEXLOWER_PERMISSIVE
        .decode(trimmed.as_bytes())
        .map_err(|e| BinaryError::InvalidHex(e.to_string()))
}
