use super::{decode_hex, pad_to, significant_bytes, BinaryError};
use data_encoding::HEXLOWER;
use num_bigint::BigUint;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash as StdHash, Hasher};

/// Variable-width unsigned big-endian value.
///
/// Leading zero bytes are not significant: `[0x00, 0x05]` and `[0x05]` compare
/// and hash equal.
#[derive(Clone, Default)]
pub struct Uint {
    raw: Vec<u8>,
}

impl Uint {
    pub fn empty() -> Uint {
        Uint { raw: Vec::new() }
    }

    pub fn from_raw(raw: impl Into<Vec<u8>>) -> Uint {
        Uint { raw: raw.into() }
    }

    /// Encodes `n` into exactly `byte_length` bytes.
    pub fn from_u64(n: u64, byte_length: usize) -> Result<Uint, BinaryError> {
        Ok(Uint {
            raw: pad_to(&n.to_be_bytes(), byte_length)?,
        })
    }

    /// Encodes `n` into exactly `byte_length` bytes.
    pub fn from_biguint(n: &BigUint, byte_length: usize) -> Result<Uint, BinaryError> {
        Ok(Uint {
            raw: pad_to(&n.to_bytes_be(), byte_length)?,
        })
    }

    pub fn from_hex(input: &str) -> Result<Uint, BinaryError> {
        Ok(Uint {
            raw: decode_hex(input)?,
        })
    }

    pub fn get_raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.raw)
    }

    pub fn to_u64(&self) -> Result<u64, BinaryError> {
        let padded = pad_to(&self.raw, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&padded);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.raw)
    }

    /// Minimal representation: no leading zero bytes, empty for zero.
    pub fn to_short(&self) -> Uint {
        Uint {
            raw: significant_bytes(&self.raw).to_vec(),
        }
    }

    /// Byte range `[start, end)`, clamped to the value's length.
    pub fn slice(&self, start: usize, end: usize) -> Uint {
        let end = end.min(self.raw.len());
        let start = start.min(end);
        Uint {
            raw: self.raw[start..end].to_vec(),
        }
    }

    pub fn concat<I, T>(parts: I) -> Uint
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut raw = Vec::new();
        for part in parts {
            raw.extend_from_slice(part.as_ref());
        }
        Uint { raw }
    }

    fn significant(&self) -> &[u8] {
        significant_bytes(&self.raw)
    }
}

impl From<u64> for Uint {
    fn from(n: u64) -> Self {
        Uint::from_raw(n.to_be_bytes().to_vec()).to_short()
    }
}

impl From<&BigUint> for Uint {
    fn from(n: &BigUint) -> Self {
        Uint::from_raw(n.to_bytes_be()).to_short()
    }
}

impl AsRef<[u8]> for Uint {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl PartialEq for Uint {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for Uint {}

impl StdHash for Uint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl Ord for Uint {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.significant(), other.significant());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl PartialOrd for Uint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Uint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint(0x{})", self.to_hex())
    }
}

impl fmt::Display for Uint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_leading_zeros() {
        let a = Uint::from_raw(vec![0x00, 0x00, 0x05]);
        let b = Uint::from_raw(vec![0x05]);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_equality_is_bytewise_not_lossy() {
        let a = Uint::from_raw(vec![0x01, 0x00]);
        let b = Uint::from_raw(vec![0x00, 0x01]);
        assert_ne!(a, b);
        assert!(a > b);
    }

    #[test]
    fn test_from_u64_respects_length() {
        let value = Uint::from_u64(258, 4).unwrap();
        assert_eq!(value.get_raw(), &[0x00, 0x00, 0x01, 0x02]);
        assert_eq!(value.to_u64().unwrap(), 258);

        assert_eq!(
            Uint::from_u64(258, 1),
            Err(BinaryError::Overflow { max_bytes: 1 })
        );
    }

    #[test]
    fn test_short_form_of_zero_is_empty() {
        let zero = Uint::from_u64(0, 8).unwrap();
        assert!(zero.to_short().is_empty());
        assert_eq!(zero.to_short().to_u64().unwrap(), 0);
        assert_eq!(Uint::from(0x1234u64).get_raw(), &[0x12, 0x34]);
    }

    #[test]
    fn test_to_u64_overflow() {
        let big = Uint::from_raw(vec![0x01; 9]);
        assert!(big.to_u64().is_err());
        assert_eq!(big.to_biguint().to_bytes_be(), vec![0x01; 9]);
    }

    #[test]
    fn test_slice_and_concat() {
        let value = Uint::from_hex("0011223344").unwrap();
        assert_eq!(value.slice(1, 3).get_raw(), &[0x11, 0x22]);
        assert_eq!(value.slice(3, 100).get_raw(), &[0x33, 0x44]);
        assert!(value.slice(10, 12).is_empty());

        let joined = Uint::concat([value.slice(0, 1), value.slice(4, 5)]);
        assert_eq!(joined.to_hex(), "0044");
    }

    #[test]
    fn test_biguint_round_trip() {
        let n = BigUint::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        let value = Uint::from_biguint(&n, 16).unwrap();
        assert_eq!(value.len(), 16);
        assert_eq!(value.to_biguint(), n);
    }
}
