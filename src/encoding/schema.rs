/// How the length (or element count) of a variable-size field is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// Big-endian count in exactly this many bytes
    Fixed(usize),
    /// Self-terminating base-15 prefix, see `unlimited`
    Unlimited,
}

/// Wire shape of one field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Minimal big-endian integer behind a 1-byte length
    BigInt,
    /// One byte, `0x00` or `0x01`
    Bool,
    /// 21-byte address
    Address,
    /// 32-byte hash
    Hash,
    /// 64-byte signature
    Signature,
    /// One byte that must be `0x00`
    Version,
    /// Exactly this many raw bytes
    Fixed(usize),
    /// Opaque bytes behind a length prefix
    Bytes(LengthPrefix),
    /// Nested object, always encoded in full
    Object(&'static Schema),
    /// Count prefix followed by each element
    Array(LengthPrefix, &'static Schema),
}

impl FieldKind {
    /// Byte width of fixed-size kinds.
    pub const fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldKind::Bool | FieldKind::Version => Some(1),
            FieldKind::Address => Some(21),
            FieldKind::Hash => Some(32),
            FieldKind::Signature => Some(64),
            FieldKind::Fixed(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub key: &'static str,
    pub kind: FieldKind,
    /// Skipped when encoding for a hash preimage
    pub hash_remove: bool,
}

impl Field {
    pub const fn new(key: &'static str, kind: FieldKind) -> Field {
        Field {
            key,
            kind,
            hash_remove: false,
        }
    }

    pub const fn hash_removed(self) -> Field {
        Field {
            hash_remove: true,
            ..self
        }
    }
}

pub type Schema = [Field];
