use super::{decode_hex, pad_to, BinaryError, Uint};
use data_encoding::HEXLOWER;
use rand::RngCore;
use std::fmt;

/// Fixed-width unsigned big-endian value of exactly `N` bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedUint<const N: usize>([u8; N]);

pub type Uint8 = FixedUint<1>;
pub type Uint16 = FixedUint<2>;
pub type Uint32 = FixedUint<4>;
pub type Uint64 = FixedUint<8>;
pub type Uint256 = FixedUint<32>;

/// SHA-256 digest
pub type Hash = Uint256;
/// ECDSA P-256 signature in fixed `r || s` form
pub type Signature = FixedUint<64>;

impl<const N: usize> FixedUint<N> {
    pub const fn zero() -> Self {
        FixedUint([0u8; N])
    }

    pub const fn from_bytes(bytes: [u8; N]) -> Self {
        FixedUint(bytes)
    }

    pub fn from_raw(raw: &[u8]) -> Result<Self, BinaryError> {
        let bytes: [u8; N] = raw.try_into().map_err(|_| BinaryError::InvalidLength {
            expected: N,
            actual: raw.len(),
        })?;
        Ok(FixedUint(bytes))
    }

    pub fn from_u64(n: u64) -> Result<Self, BinaryError> {
        Self::from_raw(&pad_to(&n.to_be_bytes(), N)?)
    }

    pub fn from_hex(input: &str) -> Result<Self, BinaryError> {
        Self::from_raw(&decode_hex(input)?)
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; N];
        rand::thread_rng().fill_bytes(&mut bytes);
        FixedUint(bytes)
    }

    pub fn get_raw(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }

    pub fn to_u64(&self) -> Result<u64, BinaryError> {
        self.to_uint().to_u64()
    }

    pub fn to_uint(&self) -> Uint {
        Uint::from_raw(self.0.to_vec())
    }

    pub fn slice(&self, start: usize, end: usize) -> Uint {
        self.to_uint().slice(start, end)
    }

    /// Compares against a variable-width value after zero-padding.
    pub fn eq_uint(&self, other: &Uint) -> bool {
        self.to_uint() == *other
    }
}

impl<const N: usize> Default for FixedUint<N> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const N: usize> AsRef<[u8]> for FixedUint<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> TryFrom<&Uint> for FixedUint<N> {
    type Error = BinaryError;

    fn try_from(value: &Uint) -> Result<Self, Self::Error> {
        Self::from_raw(value.get_raw())
    }
}

impl<const N: usize> fmt::Debug for FixedUint<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedUint<{N}>(0x{})", self.to_hex())
    }
}

impl<const N: usize> fmt::Display for FixedUint<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
